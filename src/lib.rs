//! # Logify
//!
//! Multi-tenant log ingestion and search. Clients publish structured log
//! records onto a durable topic per project; a long-running consumer drains
//! every project topic into date-partitioned document indexes
//! (`tenant-{tenant}-project-{project}-date-{YYYY-MM-DD}`), which are then
//! searched with filtering, sorting, pagination and bookmarks.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use logify::{LogRecord, LogService, LogifyConfig, SearchRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> logify::Result<()> {
//! let service = LogService::open(LogifyConfig::from_env()?)?;
//! let background = service.start(CancellationToken::new());
//!
//! let record = LogRecord {
//!     level: "ERROR".into(),
//!     message: "database connection timeout".into(),
//!     service: "api".into(),
//!     ..Default::default()
//! }
//! .scoped("tenant-1", "project-1", None);
//! service.publish(&record).await?;
//!
//! let hits = service
//!     .search(&SearchRequest::default().scoped("tenant-1", "project-1"))
//!     .await?;
//! println!("{} logs", hits.len());
//!
//! background.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Dependencies | Use case |
//! |---------|-------------|----------|
//! | `axum-support` | axum | [`LogifyError`] implements `IntoResponse` |
//! | `openapi` | utoipa | OpenAPI schema generation |
//!
//! Both are enabled by default.

pub mod broker;
pub mod clock;
pub mod config;
pub mod error;
pub mod ingest;
pub mod partition;
pub mod query;
pub mod search;
pub mod service;
pub mod store;
pub mod types;

pub use broker::{Broker, FileBroker, TopicConfig, TopicProvisioner};
pub use config::{LogifyConfig, StoreKind};
pub use error::{LogifyError, Result};
pub use ingest::{IndexWriter, IngestConsumer, LogPublisher, StatsSnapshot};
pub use partition::{partition_name, partition_pattern, PartitionDate};
pub use query::{compile, QueryDocument};
pub use service::{BackgroundTasks, LogService};
pub use store::{DocumentStore, MemoryStore, OpenSearchStore};
pub use types::*;
