//! Partitioned document storage.
//!
//! Documents live in named indexes. Log partitions follow
//! `tenant-{tenant}-project-{project}-date-{YYYY-MM-DD}` and are read through
//! wildcard patterns; the service catalog is a single fixed index.

pub mod memory;
pub mod opensearch;

use crate::config::{LogifyConfig, StoreKind};
use crate::error::Result;
use crate::query::{Clause, QueryDocument};
use crate::types::LogDocument;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub use memory::MemoryStore;
pub use opensearch::OpenSearchStore;

/// A stored document together with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub index: String,
    pub id: String,
    pub source: LogDocument,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Append `body` (a JSON object) as a new document with a store-assigned
    /// id. The index is created on first write.
    async fn index_document(&self, index: &str, body: &[u8]) -> Result<String>;

    /// Create or overwrite the document `id`.
    async fn put_document(&self, index: &str, id: &str, doc: &Value) -> Result<()>;

    /// Run a compiled query across every index matching `pattern`. A pattern
    /// that matches nothing yields no hits.
    async fn search(&self, pattern: &str, query: &QueryDocument) -> Result<Vec<Hit>>;

    /// Look a document up by id across every index matching `pattern`.
    async fn find_by_id(&self, pattern: &str, id: &str) -> Result<Option<Hit>>;

    /// Merge `partial` into the top level of an existing document.
    async fn update_document(&self, index: &str, id: &str, partial: &Value) -> Result<()>;

    /// Distinct values of `field` in `index` among documents matching
    /// `filter`, most frequent first, at most `size` keys.
    async fn terms(
        &self,
        index: &str,
        field: &str,
        filter: &[Clause],
        size: usize,
    ) -> Result<Vec<String>>;
}

/// Build the store selected by `config.store`.
pub fn from_config(config: &LogifyConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.store {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreKind::OpenSearch => Ok(Arc::new(OpenSearchStore::new(&config.opensearch)?)),
    }
}

/// Match an index name against a pattern where `*` matches any run of
/// characters.
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !name.starts_with(first) || name.len() < first.len() + last.len() {
        return false;
    }
    if !name[first.len()..].ends_with(last) {
        return false;
    }

    let mut rest = &name[first.len()..name.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}
