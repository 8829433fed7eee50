use crate::error::{LogifyError, Result};
use crate::partition::partition_pattern;
use crate::query::compile;
use crate::store::{DocumentStore, Hit};
use crate::types::{LogDocument, SearchRequest};
use serde_json::Value;
use std::sync::Arc;

/// Ownership fields never returned to callers.
const STRIPPED_FIELDS: &[&str] = &["tenant_id", "project_id", "user_id"];

pub struct SearchExecutor {
    store: Arc<dyn DocumentStore>,
}

impl SearchExecutor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Search every date partition of the request's tenant/project. Results
    /// keep the store's order.
    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<LogDocument>> {
        if req.tenant_id.is_empty() || req.project_id.is_empty() {
            return Err(LogifyError::MissingContext(
                "search requires tenant and project".into(),
            ));
        }
        validate_metadata_filters(req)?;

        let query = compile(req);
        let pattern = partition_pattern(&req.tenant_id, &req.project_id);
        let hits = self.store.search(&pattern, &query).await?;
        tracing::debug!("[SEARCH] {} -> {} hits", pattern, hits.len());
        Ok(hits.into_iter().map(sanitize).collect())
    }
}

/// Metadata filters compile to exact `term` matches, which only take scalars.
fn validate_metadata_filters(req: &SearchRequest) -> Result<()> {
    let mut keys: Vec<&String> = req.metadata.keys().collect();
    keys.sort();
    for key in keys {
        match &req.metadata[key] {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {}
            other => {
                let kind = match other {
                    Value::Null => "null",
                    Value::Array(_) => "an array",
                    _ => "an object",
                };
                return Err(LogifyError::InvalidRequest(format!(
                    "metadata filter '{}' must be a string, number or boolean, got {}",
                    key, kind
                )));
            }
        }
    }
    Ok(())
}

/// Drop ownership fields and expose the storage id as `id`.
pub fn sanitize(hit: Hit) -> LogDocument {
    let mut doc: LogDocument = hit
        .source
        .into_iter()
        .filter(|(k, _)| !STRIPPED_FIELDS.contains(&k.as_str()))
        .collect();
    doc.insert("id".to_string(), Value::String(hit.id));
    doc
}
