//! Durable per-project delivery channels.
//!
//! The pipeline talks to the broker through the [`Broker`] trait. The
//! workspace ships [`file::FileBroker`], a single-node broker that keeps each
//! topic partition as append-only JSON-lines segments on disk.

pub mod file;
pub mod provisioner;

use crate::error::Result;
use crate::types::Delivery;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use file::FileBroker;
pub use provisioner::TopicProvisioner;

/// What happens to records older than the retention window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    Delete,
    Compact,
}

/// Per-topic policy applied at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub partitions: u32,
    pub replication_factor: u16,
    pub cleanup_policy: CleanupPolicy,
    pub retention_ms: u64,
    pub segment_bytes: u64,
    pub max_message_bytes: usize,
}

impl TopicConfig {
    pub const INGESTION_PARTITIONS: u32 = 3;
    pub const INGESTION_REPLICATION_FACTOR: u16 = 1;
    /// 7 days.
    pub const INGESTION_RETENTION_MS: u64 = 604_800_000;
    /// 100 MB.
    pub const INGESTION_SEGMENT_BYTES: u64 = 104_857_600;
    /// 1 MB.
    pub const INGESTION_MAX_MESSAGE_BYTES: usize = 1_048_576;

    /// Fixed policy for every project ingestion topic.
    pub fn ingestion() -> Self {
        Self {
            partitions: Self::INGESTION_PARTITIONS,
            replication_factor: Self::INGESTION_REPLICATION_FACTOR,
            cleanup_policy: CleanupPolicy::Delete,
            retention_ms: Self::INGESTION_RETENTION_MS,
            segment_bytes: Self::INGESTION_SEGMENT_BYTES,
            max_message_bytes: Self::INGESTION_MAX_MESSAGE_BYTES,
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }
}

/// One record read back from a topic partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub timestamp_ms: u64,
    pub payload: Vec<u8>,
}

/// Broker operations used by the provisioner, the publisher and the consumer.
///
/// `produce` resolves only once the broker has accepted (or rejected) the
/// record. Producing to a topic that does not exist fails with
/// [`LogifyError::UnknownTopic`](crate::LogifyError::UnknownTopic); creating a
/// topic that exists fails with
/// [`LogifyError::TopicAlreadyExists`](crate::LogifyError::TopicAlreadyExists).
#[async_trait]
pub trait Broker: Send + Sync {
    async fn create_topic(&self, name: &str, config: &TopicConfig) -> Result<()>;

    async fn list_topics(&self) -> Result<Vec<String>>;

    async fn partition_count(&self, topic: &str) -> Result<u32>;

    async fn produce(&self, topic: &str, payload: &[u8]) -> Result<Delivery>;

    /// Read up to `max_records` records with `offset >= from_offset`.
    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_records: usize,
    ) -> Result<Vec<ConsumedRecord>>;

    /// Oldest offset still retained for a partition.
    async fn earliest_offset(&self, topic: &str, partition: u32) -> Result<u64>;

    /// Next offset to read for `group`, if the group ever committed one.
    async fn committed_offset(&self, group: &str, topic: &str, partition: u32)
        -> Result<Option<u64>>;

    async fn commit_offset(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: u64,
    ) -> Result<()>;
}

/// Topic name for a project: `{namespace}-{project_id}`.
pub fn topic_name(namespace: &str, project_id: &str) -> String {
    format!("{}-{}", namespace, project_id)
}
