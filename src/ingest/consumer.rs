use super::writer::IndexWriter;
use crate::broker::Broker;
use crate::config::LogifyConfig;
use crate::error::{LogifyError, Result};
use crate::types::LogRecord;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

const MAX_POLL_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
pub struct ConsumerStats {
    records_indexed: AtomicU64,
    decode_failures: AtomicU64,
    rejected_records: AtomicU64,
    index_failures: AtomicU64,
    poll_errors: AtomicU64,
    subscribed_topics: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatsSnapshot {
    pub records_indexed: u64,
    pub decode_failures: u64,
    pub rejected_records: u64,
    pub index_failures: u64,
    pub poll_errors: u64,
    pub subscribed_topics: usize,
}

impl ConsumerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_indexed: self.records_indexed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            rejected_records: self.rejected_records.load(Ordering::Relaxed),
            index_failures: self.index_failures.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            subscribed_topics: self.subscribed_topics.load(Ordering::Relaxed),
        }
    }
}

/// Topic partition -> next offset to read.
type Assignments = BTreeMap<(String, u32), u64>;

/// Drains every ingestion topic into the document store.
///
/// Topics are discovered by regex, on startup, on a timer, and whenever the
/// provisioner announces a new topic. Offsets are committed to the broker
/// only after the records before them were indexed, so a crash replays at
/// most one batch per partition.
///
/// A record the store refuses outright is logged, counted and committed past;
/// a store that is unreachable or throttling stops the pass and the poll loop
/// backs off before trying the same offset again.
pub struct IngestConsumer {
    broker: Arc<dyn Broker>,
    writer: Arc<IndexWriter>,
    group: String,
    node_id: String,
    topic_filter: Regex,
    poll_interval: Duration,
    max_records: usize,
    discovery_interval: Duration,
    provisioned: Arc<Notify>,
    stats: Arc<ConsumerStats>,
}

impl IngestConsumer {
    pub fn new(
        broker: Arc<dyn Broker>,
        writer: Arc<IndexWriter>,
        config: &LogifyConfig,
        provisioned: Arc<Notify>,
    ) -> Result<Self> {
        let topic_filter = Regex::new(&config.topic_pattern())
            .map_err(|e| LogifyError::Config(format!("Invalid topic pattern: {}", e)))?;
        Ok(Self {
            broker,
            writer,
            group: config.consumer_group.clone(),
            node_id: config.node_id.clone(),
            topic_filter,
            poll_interval: config.poll_interval,
            max_records: config.poll_max_records,
            discovery_interval: config.discovery_interval,
            provisioned,
            stats: Arc::new(ConsumerStats::default()),
        })
    }

    pub fn stats(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    /// Ingestion topics currently known to the broker.
    pub async fn discover(&self) -> Result<Vec<String>> {
        Ok(self
            .broker
            .list_topics()
            .await?
            .into_iter()
            .filter(|t| self.topic_filter.is_match(t))
            .collect())
    }

    async fn refresh(&self, assignments: &mut Assignments) -> Result<()> {
        let topics = self.discover().await?;
        let known: BTreeSet<String> = assignments.keys().map(|(t, _)| t.clone()).collect();

        for topic in topics.iter().filter(|t| !known.contains(*t)) {
            let partitions = self.broker.partition_count(topic).await?;
            for partition in 0..partitions {
                let start = match self
                    .broker
                    .committed_offset(&self.group, topic, partition)
                    .await?
                {
                    Some(offset) => offset,
                    None => self.broker.earliest_offset(topic, partition).await?,
                };
                assignments.insert((topic.clone(), partition), start);
            }
            tracing::info!(
                "[DISCOVERY] subscribed to {} ({} partitions)",
                topic,
                partitions
            );
        }

        if topics.is_empty() {
            tracing::info!(
                "[DISCOVERY] no topics match {} yet",
                self.topic_filter.as_str()
            );
        }
        let subscribed: BTreeSet<&String> = assignments.keys().map(|(t, _)| t).collect();
        self.stats
            .subscribed_topics
            .store(subscribed.len(), Ordering::Relaxed);
        Ok(())
    }

    /// One pass over every assigned partition. Returns the number of records
    /// consumed (indexed or skipped). A transient store failure ends the pass
    /// early, after committing what was indexed, and is returned.
    async fn poll_once(
        &self,
        assignments: &mut Assignments,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let mut consumed = 0;
        let mut vanished = Vec::new();
        let mut store_failure: Option<LogifyError> = None;

        for ((topic, partition), next) in assignments.iter_mut() {
            if cancel.is_cancelled() || store_failure.is_some() {
                break;
            }

            let records = match self
                .broker
                .fetch(topic, *partition, *next, self.max_records)
                .await
            {
                Ok(records) => records,
                Err(LogifyError::UnknownTopic(_)) => {
                    vanished.push(topic.clone());
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut commit_to = *next;
            for rec in records {
                let decoded = serde_json::from_slice::<LogRecord>(&rec.payload)
                    .map_err(|e| e.to_string())
                    .and_then(|r| {
                        if r.tenant_id.is_empty() || r.project_id.is_empty() {
                            Err("missing tenant_id or project_id".to_string())
                        } else {
                            Ok(r)
                        }
                    });
                let record = match decoded {
                    Ok(record) => record,
                    Err(e) => {
                        self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            "[CONSUMER] skipping undecodable record {}/{}@{}: {}",
                            topic,
                            partition,
                            rec.offset,
                            e
                        );
                        commit_to = rec.offset + 1;
                        consumed += 1;
                        continue;
                    }
                };

                match self.writer.index(&record, &rec.payload).await {
                    Ok(_) => {
                        self.stats.records_indexed.fetch_add(1, Ordering::Relaxed);
                        commit_to = rec.offset + 1;
                        consumed += 1;
                    }
                    Err(e) if e.is_permanent_rejection() => {
                        self.stats.rejected_records.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            "[CONSUMER] store rejected {}/{}@{}, skipping: {}",
                            topic,
                            partition,
                            rec.offset,
                            e
                        );
                        commit_to = rec.offset + 1;
                        consumed += 1;
                    }
                    Err(e) => {
                        // Leave the rest of this partition for the next poll.
                        self.stats.index_failures.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            "[CONSUMER] failed to index {}/{}@{}: {}",
                            topic,
                            partition,
                            rec.offset,
                            e
                        );
                        store_failure = Some(e);
                        break;
                    }
                }
            }

            if commit_to > *next {
                self.broker
                    .commit_offset(&self.group, topic, *partition, commit_to)
                    .await?;
                *next = commit_to;
            }
        }

        if !vanished.is_empty() {
            assignments.retain(|(topic, _), _| !vanished.contains(topic));
            tracing::warn!("[CONSUMER] dropped vanished topics {:?}", vanished);
        }
        match store_failure {
            Some(e) => Err(e),
            None => Ok(consumed),
        }
    }

    /// Consume until `cancel` fires. The batch in hand is finished and
    /// committed before returning.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut assignments = Assignments::new();

        let mut backoff = self.poll_interval;
        loop {
            match self.refresh(&mut assignments).await {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!(
                        "[DISCOVERY] initial topic listing failed, retrying in {:?}: {}",
                        backoff,
                        e
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_POLL_BACKOFF);
                }
            }
        }

        let mut discovery = tokio::time::interval_at(
            tokio::time::Instant::now() + self.discovery_interval,
            self.discovery_interval,
        );
        let mut poll_backoff = self.poll_interval;

        tracing::info!(
            "[CONSUMER] started on {} (group={}, partitions={})",
            self.node_id,
            self.group,
            assignments.len()
        );

        loop {
            let delay = match self.poll_once(&mut assignments, &cancel).await {
                Ok(n) => {
                    poll_backoff = self.poll_interval;
                    if n > 0 {
                        Duration::ZERO
                    } else {
                        self.poll_interval
                    }
                }
                Err(e) => {
                    self.stats.poll_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("[CONSUMER] poll failed, backing off {:?}: {}", poll_backoff, e);
                    let delay = poll_backoff;
                    poll_backoff = (poll_backoff * 2).min(MAX_POLL_BACKOFF);
                    delay
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = discovery.tick() => {
                    if let Err(e) = self.refresh(&mut assignments).await {
                        tracing::warn!("[DISCOVERY] refresh failed: {}", e);
                    }
                }
                _ = self.provisioned.notified() => {
                    if let Err(e) = self.refresh(&mut assignments).await {
                        tracing::warn!("[DISCOVERY] refresh failed: {}", e);
                    }
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("[CONSUMER] shutting down");
        Ok(())
    }
}
