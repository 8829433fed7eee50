use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::partition::{partition_name, PartitionDate};
use crate::store::DocumentStore;
use crate::types::LogRecord;
use dashmap::DashSet;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Writes decoded records into their tenant/project/date partition and keeps
/// the service catalog up to date.
pub struct IndexWriter {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    partition_date: PartitionDate,
    catalog_index: Option<String>,
    registered: DashSet<String>,
}

/// Deterministic catalog id for a tenant/project/service triple.
pub fn catalog_entry_id(tenant_id: &str, project_id: &str, service: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(project_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(service.as_bytes());
    hex::encode(hasher.finalize())
}

impl IndexWriter {
    pub fn new(store: Arc<dyn DocumentStore>, partition_date: PartitionDate) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            partition_date,
            catalog_index: None,
            registered: DashSet::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register each record's service in `index`.
    pub fn with_catalog(mut self, index: impl Into<String>) -> Self {
        self.catalog_index = Some(index.into());
        self
    }

    pub fn partition_for(&self, record: &LogRecord) -> String {
        let date = self.partition_date.date_for(record, self.clock.now());
        partition_name(&record.tenant_id, &record.project_id, date)
    }

    /// Append `raw` as a new document in the record's partition. Returns the
    /// store-assigned document id.
    pub async fn index(&self, record: &LogRecord, raw: &[u8]) -> Result<String> {
        let partition = self.partition_for(record);
        let id = self.store.index_document(&partition, raw).await?;
        tracing::debug!("[INDEX] {} -> {}/{}", record.service, partition, id);

        if let Some(catalog) = &self.catalog_index {
            self.register_service(catalog, record).await;
        }
        Ok(id)
    }

    async fn register_service(&self, catalog: &str, record: &LogRecord) {
        if record.service.is_empty() {
            return;
        }
        let id = catalog_entry_id(&record.tenant_id, &record.project_id, &record.service);
        if self.registered.contains(&id) {
            return;
        }

        let entry = json!({
            "service": record.service,
            "tenant_id": record.tenant_id,
            "project_id": record.project_id,
        });
        match self.store.put_document(catalog, &id, &entry).await {
            Ok(()) => {
                self.registered.insert(id);
            }
            Err(e) => tracing::warn!(
                "[INDEX] catalog registration failed for service {}: {}",
                record.service,
                e
            ),
        }
    }
}
