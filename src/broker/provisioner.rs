use super::{topic_name, Broker, TopicConfig};
use crate::error::{LogifyError, Result};
use std::sync::Arc;
use tokio::sync::Notify;

/// Creates per-project ingestion topics on demand.
///
/// Every topic gets [`TopicConfig::ingestion`]. Creation of a topic that
/// already exists counts as success, so concurrent callers converge.
pub struct TopicProvisioner {
    broker: Arc<dyn Broker>,
    namespace: String,
    config: TopicConfig,
    provisioned: Arc<Notify>,
}

impl TopicProvisioner {
    pub fn new(broker: Arc<dyn Broker>, namespace: impl Into<String>) -> Self {
        Self {
            broker,
            namespace: namespace.into(),
            config: TopicConfig::ingestion(),
            provisioned: Arc::new(Notify::new()),
        }
    }

    /// Handle woken each time a topic is newly created. Topic discovery
    /// waits on it so new projects are picked up without waiting a full
    /// discovery interval.
    pub fn provisioned(&self) -> Arc<Notify> {
        Arc::clone(&self.provisioned)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn topic_for(&self, project_id: &str) -> String {
        topic_name(&self.namespace, project_id)
    }

    pub async fn ensure(&self, project_id: &str) -> Result<()> {
        let topic = self.topic_for(project_id);
        match self.broker.create_topic(&topic, &self.config).await {
            Ok(()) => {
                tracing::info!("[PROVISION] created topic {}", topic);
                self.provisioned.notify_one();
                Ok(())
            }
            Err(LogifyError::TopicAlreadyExists(_)) => {
                tracing::debug!("[PROVISION] topic {} already exists", topic);
                Ok(())
            }
            Err(e) => {
                tracing::error!("[PROVISION] failed to create topic {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::FileBroker;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let broker = FileBroker::open(&tmp.path().join("topics"), &tmp.path().join("groups")).unwrap();
        let provisioner = TopicProvisioner::new(broker.clone(), "logify");

        provisioner.ensure("p1").await.unwrap();
        provisioner.ensure("p1").await.unwrap();

        assert_eq!(broker.list_topics().await.unwrap(), vec!["logify-p1"]);
        assert_eq!(broker.partition_count("logify-p1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ensure_signals_new_topics() {
        let tmp = TempDir::new().unwrap();
        let broker = FileBroker::open(&tmp.path().join("topics"), &tmp.path().join("groups")).unwrap();
        let provisioner = TopicProvisioner::new(broker, "logify");
        let notify = provisioner.provisioned();

        provisioner.ensure("p1").await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), notify.notified())
            .await
            .expect("new topic should wake discovery");
    }

    #[tokio::test]
    async fn test_ensure_surfaces_invalid_names() {
        let tmp = TempDir::new().unwrap();
        let broker = FileBroker::open(&tmp.path().join("topics"), &tmp.path().join("groups")).unwrap();
        let provisioner = TopicProvisioner::new(broker, "logify");

        let err = provisioner.ensure("bad/project").await.unwrap_err();
        assert!(matches!(err, LogifyError::InvalidTopic(_)));
    }
}
