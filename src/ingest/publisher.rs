use crate::broker::{Broker, TopicProvisioner};
use crate::error::{LogifyError, Result};
use crate::types::{Delivery, LogRecord};
use std::sync::Arc;

/// Publishes records onto their project's topic, provisioning the topic on
/// first use.
pub struct LogPublisher {
    broker: Arc<dyn Broker>,
    provisioner: Arc<TopicProvisioner>,
}

impl LogPublisher {
    pub fn new(broker: Arc<dyn Broker>, provisioner: Arc<TopicProvisioner>) -> Self {
        Self {
            broker,
            provisioner,
        }
    }

    /// Serialize and append `record`, resolving once the broker acknowledged
    /// the write.
    ///
    /// If the topic does not exist yet it is provisioned and the same payload
    /// is produced exactly once more. Any other failure, or a failure of that
    /// retry, is returned as is.
    pub async fn publish(&self, record: &LogRecord) -> Result<Delivery> {
        if record.tenant_id.is_empty() || record.project_id.is_empty() {
            return Err(LogifyError::InvalidRequest(
                "record has no tenant or project".into(),
            ));
        }

        let payload =
            serde_json::to_vec(record).map_err(|e| LogifyError::Serialization(e.to_string()))?;
        let topic = self.provisioner.topic_for(&record.project_id);

        let delivery = match self.broker.produce(&topic, &payload).await {
            Err(LogifyError::UnknownTopic(_)) => {
                tracing::info!("[PUBLISH] topic {} missing, provisioning", topic);
                self.provisioner.ensure(&record.project_id).await?;
                self.broker.produce(&topic, &payload).await
            }
            other => other,
        };

        match &delivery {
            Ok(d) => tracing::debug!(
                "[PUBLISH] {} bytes -> {}/{}@{}",
                payload.len(),
                d.topic,
                d.partition,
                d.offset
            ),
            Err(e) => tracing::warn!("[PUBLISH] failed to publish to {}: {}", topic, e),
        }
        delivery
    }
}
