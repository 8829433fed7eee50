use crate::error::{LogifyError, Result};
use crate::partition::partition_pattern;
use crate::store::DocumentStore;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct BookmarkUpdater {
    store: Arc<dyn DocumentStore>,
}

impl BookmarkUpdater {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Set `is_bookmarked = true` on a stored log. The document must live in
    /// one of the caller's partitions and carry the caller's tenant and
    /// project; otherwise it is reported as not found. Repeating the call is
    /// harmless.
    pub async fn bookmark(&self, log_id: &str, tenant_id: &str, project_id: &str) -> Result<()> {
        if log_id.trim().is_empty() {
            return Err(LogifyError::InvalidRequest("log_id is required".into()));
        }

        let pattern = partition_pattern(tenant_id, project_id);
        let hit = self
            .store
            .find_by_id(&pattern, log_id)
            .await?
            .ok_or_else(|| LogifyError::DocumentNotFound(log_id.to_string()))?;

        let owned = |field: &str, expected: &str| {
            hit.source.get(field).and_then(Value::as_str) == Some(expected)
        };
        if !owned("tenant_id", tenant_id) || !owned("project_id", project_id) {
            tracing::warn!(
                "[BOOKMARK] {} in {} does not belong to {}/{}",
                log_id,
                hit.index,
                tenant_id,
                project_id
            );
            return Err(LogifyError::DocumentNotFound(log_id.to_string()));
        }

        self.store
            .update_document(&hit.index, log_id, &json!({ "is_bookmarked": true }))
            .await
    }
}
