//! Write path: publish records onto project topics, drain the topics into
//! partitioned indexes.

pub mod consumer;
pub mod publisher;
pub mod supervisor;
pub mod writer;

pub use consumer::{ConsumerStats, IngestConsumer, StatsSnapshot};
pub use publisher::LogPublisher;
pub use supervisor::{ConsumerSupervisor, RestartPolicy};
pub use writer::{catalog_entry_id, IndexWriter};
