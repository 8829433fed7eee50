use crate::error::Result;
use crate::query::{keyword_field, Clause};
use crate::store::DocumentStore;
use std::sync::Arc;

/// Distinct service names from the catalog index.
pub struct ServiceDirectory {
    store: Arc<dyn DocumentStore>,
    catalog_index: String,
    size: usize,
}

impl ServiceDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, catalog_index: impl Into<String>, size: usize) -> Self {
        Self {
            store,
            catalog_index: catalog_index.into(),
            size,
        }
    }

    /// Every service known to the catalog, across all tenants.
    pub async fn list_services(&self) -> Result<Vec<String>> {
        self.store
            .terms(&self.catalog_index, &keyword_field("service"), &[], self.size)
            .await
    }

    /// Services registered for one tenant/project.
    pub async fn list_project_services(
        &self,
        tenant_id: &str,
        project_id: &str,
    ) -> Result<Vec<String>> {
        let filter = [
            Clause::term(keyword_field("tenant_id"), tenant_id),
            Clause::term(keyword_field("project_id"), project_id),
        ];
        self.store
            .terms(&self.catalog_index, &keyword_field("service"), &filter, self.size)
            .await
    }
}
