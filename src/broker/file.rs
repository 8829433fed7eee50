use super::{Broker, CleanupPolicy, ConsumedRecord, TopicConfig};
use crate::error::{LogifyError, Result};
use crate::types::Delivery;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TOPIC_META_FILE: &str = "topic.json";
const MAX_NAME_LEN: usize = 249;
/// Bytes appended between two sparse index entries of a segment.
const INDEX_INTERVAL_BYTES: u64 = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TopicRecord {
    offset: u64,
    timestamp_ms: u64,
    /// Base64 of the raw payload bytes.
    payload: String,
}

struct ActiveSegment {
    writer: BufWriter<File>,
    path: PathBuf,
    base_offset: u64,
    size: u64,
}

/// Segment base offset -> ascending `(offset, byte position)` entries.
type SparseIndex = BTreeMap<u64, Vec<(u64, u64)>>;

struct PartitionLog {
    dir: PathBuf,
    segment_bytes: u64,
    next_offset: AtomicU64,
    segment: Mutex<ActiveSegment>,
    index: Mutex<SparseIndex>,
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

fn segment_path(dir: &Path, base_offset: u64) -> PathBuf {
    dir.join(format!("segment_{:020}.jsonl", base_offset))
}

/// Segment files of a partition directory, sorted by base offset.
fn list_segments(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut segments: Vec<(u64, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            let base = name
                .strip_prefix("segment_")
                .and_then(|s| s.strip_suffix(".jsonl"))
                .and_then(|s| s.parse::<u64>().ok())?;
            Some((base, e.path()))
        })
        .collect();
    segments.sort_by_key(|(base, _)| *base);
    Ok(segments)
}

/// Parse the records of a segment starting at byte `start`, passing each one
/// with the byte position of its line to `visit` until it returns false.
fn scan_segment(
    path: &Path,
    start: u64,
    mut visit: impl FnMut(u64, TopicRecord) -> Result<bool>,
) -> Result<()> {
    let mut reader = BufReader::new(File::open(path)?);
    reader.seek(SeekFrom::Start(start))?;

    let mut pos = start;
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(());
        }
        let line_pos = pos;
        pos += n as u64;
        if line.trim().is_empty() {
            continue;
        }
        // A torn trailing write is skipped rather than failing the whole read.
        if let Ok(record) = serde_json::from_str::<TopicRecord>(line.trim_end()) {
            if !visit(line_pos, record)? {
                return Ok(());
            }
        }
    }
}

fn read_segment(path: &Path) -> Result<Vec<TopicRecord>> {
    let mut records = Vec::new();
    scan_segment(path, 0, |_, record| {
        records.push(record);
        Ok(true)
    })?;
    Ok(records)
}

/// Record `offset` at `pos` once `INDEX_INTERVAL_BYTES` have passed since the
/// previous entry.
fn note_position(entries: &mut Vec<(u64, u64)>, offset: u64, pos: u64) {
    let last = entries.last().map_or(0, |(_, p)| *p);
    if pos >= last + INDEX_INTERVAL_BYTES {
        entries.push((offset, pos));
    }
}

fn lock_err<T>(_: T) -> LogifyError {
    LogifyError::Broker("partition lock poisoned".to_string())
}

impl PartitionLog {
    fn open(dir: &Path, segment_bytes: u64) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let segments = list_segments(dir)?;
        let (base_offset, path) = match segments.last() {
            Some((base, path)) => (*base, path.clone()),
            None => (0, segment_path(dir, 0)),
        };

        let mut next_offset = base_offset;
        let mut index = SparseIndex::new();
        for (base, segment) in &segments {
            let mut entries = Vec::new();
            scan_segment(segment, 0, |pos, record| {
                note_position(&mut entries, record.offset, pos);
                next_offset = next_offset.max(record.offset + 1);
                Ok(true)
            })?;
            index.insert(*base, entries);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let mut size = file.metadata()?.len();

        // Terminate a torn line so the next append starts on a fresh line.
        if size > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
                size += 1;
            }
        }

        Ok(PartitionLog {
            dir: dir.to_path_buf(),
            segment_bytes,
            next_offset: AtomicU64::new(next_offset),
            segment: Mutex::new(ActiveSegment {
                writer: BufWriter::new(file),
                path,
                base_offset,
                size,
            }),
            index: Mutex::new(index),
        })
    }

    fn append(&self, payload: &[u8]) -> Result<u64> {
        let mut seg = self.segment.lock().map_err(lock_err)?;
        let offset = self.next_offset.load(Ordering::SeqCst);
        let record = TopicRecord {
            offset,
            timestamp_ms: now_ms(),
            payload: BASE64.encode(payload),
        };
        let line = serde_json::to_string(&record)?;
        let pos = seg.size;

        seg.writer.write_all(line.as_bytes())?;
        seg.writer.write_all(b"\n")?;
        seg.writer.flush()?;
        seg.writer.get_ref().sync_data()?;
        seg.size += line.len() as u64 + 1;
        self.next_offset.store(offset + 1, Ordering::SeqCst);
        note_position(
            self.index
                .lock()
                .map_err(lock_err)?
                .entry(seg.base_offset)
                .or_default(),
            offset,
            pos,
        );

        if seg.size >= self.segment_bytes {
            self.rotate_segment_locked(&mut seg, offset + 1)?;
        }

        Ok(offset)
    }

    fn rotate_segment_locked(&self, seg: &mut ActiveSegment, base_offset: u64) -> Result<()> {
        seg.writer.flush()?;
        let new_path = segment_path(&self.dir, base_offset);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&new_path)?;
        seg.writer = BufWriter::new(file);
        seg.path = new_path;
        seg.base_offset = base_offset;
        seg.size = 0;
        Ok(())
    }

    /// Byte position in segment `base` to start scanning for `from`.
    fn seek_position(&self, base: u64, from: u64) -> Result<u64> {
        let index = self.index.lock().map_err(lock_err)?;
        Ok(index
            .get(&base)
            .and_then(|entries| {
                let after = entries.partition_point(|(offset, _)| *offset <= from);
                after.checked_sub(1).map(|i| entries[i].1)
            })
            .unwrap_or(0))
    }

    fn read_from(
        &self,
        topic: &str,
        partition: u32,
        from: u64,
        max: usize,
    ) -> Result<Vec<ConsumedRecord>> {
        let mut out = Vec::new();
        if max == 0 || from >= self.next_offset.load(Ordering::SeqCst) {
            return Ok(out);
        }

        let segments = list_segments(&self.dir)?;
        for (i, (base, path)) in segments.iter().enumerate() {
            // Skip segments that end before `from`.
            if let Some((next_base, _)) = segments.get(i + 1) {
                if *next_base <= from {
                    continue;
                }
            }
            let start = self.seek_position(*base, from)?;
            scan_segment(path, start, |_, record| {
                if record.offset < from {
                    return Ok(true);
                }
                let payload = BASE64.decode(record.payload.as_bytes()).map_err(|e| {
                    LogifyError::Broker(format!(
                        "corrupt payload at {}/{}@{}: {}",
                        topic, partition, record.offset, e
                    ))
                })?;
                out.push(ConsumedRecord {
                    topic: topic.to_string(),
                    partition,
                    offset: record.offset,
                    timestamp_ms: record.timestamp_ms,
                    payload,
                });
                Ok(out.len() < max)
            })?;
            if out.len() >= max {
                break;
            }
        }
        Ok(out)
    }

    fn earliest_offset(&self) -> Result<u64> {
        Ok(list_segments(&self.dir)?
            .first()
            .map(|(base, _)| *base)
            .unwrap_or_else(|| self.next_offset.load(Ordering::SeqCst)))
    }

    /// Delete closed segments whose newest record is older than the cutoff.
    fn truncate_expired(&self, cutoff_ms: u64) -> Result<usize> {
        let active = {
            let seg = self.segment.lock().map_err(lock_err)?;
            seg.path.clone()
        };

        let mut removed = 0;
        for (base, path) in list_segments(&self.dir)? {
            if path == active {
                continue;
            }
            let newest = read_segment(&path)?
                .iter()
                .map(|r| r.timestamp_ms)
                .max()
                .unwrap_or(0);
            if newest < cutoff_ms {
                fs::remove_file(&path)?;
                self.index.lock().map_err(lock_err)?.remove(&base);
                removed += 1;
            }
        }
        Ok(removed)
    }
}

struct TopicLog {
    config: TopicConfig,
    partitions: Vec<Arc<PartitionLog>>,
    next_partition: AtomicU64,
}

impl TopicLog {
    fn open(dir: &Path, config: TopicConfig) -> Result<Self> {
        let partitions = (0..config.partitions)
            .map(|p| {
                PartitionLog::open(&dir.join(format!("partition-{}", p)), config.segment_bytes)
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TopicLog {
            config,
            partitions,
            next_partition: AtomicU64::new(0),
        })
    }

    fn partition(&self, topic: &str, partition: u32) -> Result<Arc<PartitionLog>> {
        self.partitions
            .get(partition as usize)
            .cloned()
            .ok_or_else(|| LogifyError::UnknownTopic(format!("{}/{}", topic, partition)))
    }
}

/// Single-node broker persisting topics under a data directory.
///
/// Layout: `{topics_dir}/{topic}/topic.json` holds the [`TopicConfig`];
/// `{topics_dir}/{topic}/partition-{n}/segment_{base}.jsonl` holds records.
/// Consumer-group offsets live in `{groups_dir}/{group}/{topic}.json`.
pub struct FileBroker {
    topics_dir: PathBuf,
    groups_dir: PathBuf,
    topics: DashMap<String, Arc<TopicLog>>,
    offsets: DashMap<(String, String), BTreeMap<u32, u64>>,
    create_lock: Mutex<()>,
    offsets_lock: Mutex<()>,
}

/// Kafka-compatible names: ASCII alphanumerics, `.`, `_`, `-`.
pub fn validate_name(name: &str) -> Result<()> {
    let legal = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if legal {
        Ok(())
    } else {
        Err(LogifyError::InvalidTopic(name.to_string()))
    }
}

impl FileBroker {
    /// Open the broker, loading every topic already present on disk.
    pub fn open(topics_dir: &Path, groups_dir: &Path) -> Result<Arc<Self>> {
        fs::create_dir_all(topics_dir)?;
        fs::create_dir_all(groups_dir)?;

        let topics = DashMap::new();
        for entry in fs::read_dir(topics_dir)?.filter_map(|e| e.ok()) {
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let meta_path = path.join(TOPIC_META_FILE);
            if !path.is_dir() || !meta_path.exists() {
                continue;
            }
            let loaded = fs::read_to_string(&meta_path)
                .map_err(LogifyError::from)
                .and_then(|raw| serde_json::from_str::<TopicConfig>(&raw).map_err(Into::into))
                .and_then(|config| TopicLog::open(&path, config));
            match loaded {
                Ok(log) => {
                    topics.insert(name, Arc::new(log));
                }
                Err(e) => {
                    tracing::warn!("[BROKER] skipping unreadable topic {}: {}", name, e);
                }
            }
        }

        tracing::info!(
            "[BROKER] opened {} topics from {}",
            topics.len(),
            topics_dir.display()
        );

        Ok(Arc::new(Self {
            topics_dir: topics_dir.to_path_buf(),
            groups_dir: groups_dir.to_path_buf(),
            topics,
            offsets: DashMap::new(),
            create_lock: Mutex::new(()),
            offsets_lock: Mutex::new(()),
        }))
    }

    fn topic(&self, name: &str) -> Result<Arc<TopicLog>> {
        self.topics
            .get(name)
            .map(|t| Arc::clone(t.value()))
            .ok_or_else(|| LogifyError::UnknownTopic(name.to_string()))
    }

    fn offsets_path(&self, group: &str, topic: &str) -> PathBuf {
        self.groups_dir.join(group).join(format!("{}.json", topic))
    }

    fn load_offsets(&self, group: &str, topic: &str) -> Result<BTreeMap<u32, u64>> {
        let key = (group.to_string(), topic.to_string());
        if let Some(cached) = self.offsets.get(&key) {
            return Ok(cached.clone());
        }
        let path = self.offsets_path(group, topic);
        let map = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            BTreeMap::new()
        };
        self.offsets.insert(key, map.clone());
        Ok(map)
    }

    /// Delete expired segments across every topic. Returns segments removed.
    pub fn enforce_retention(&self) -> Result<usize> {
        self.enforce_retention_at(now_ms())
    }

    pub fn enforce_retention_at(&self, now_ms: u64) -> Result<usize> {
        let mut removed = 0;
        for entry in self.topics.iter() {
            let topic = entry.value();
            if topic.config.cleanup_policy != CleanupPolicy::Delete {
                continue;
            }
            let cutoff = now_ms.saturating_sub(topic.config.retention_ms);
            for partition in &topic.partitions {
                removed += partition.truncate_expired(cutoff)?;
            }
        }
        Ok(removed)
    }

    /// Periodic retention sweep until cancelled.
    pub async fn run_retention_loop(self: Arc<Self>, every: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let broker = Arc::clone(&self);
                    match tokio::task::spawn_blocking(move || broker.enforce_retention()).await {
                        Ok(Ok(n)) if n > 0 => {
                            tracing::info!("[BROKER] retention removed {} expired segments", n)
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => tracing::warn!("[BROKER] retention sweep failed: {}", e),
                        Err(e) => tracing::warn!("[BROKER] retention task panicked: {}", e),
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::info!("[BROKER] retention loop shutting down");
                    break;
                }
            }
        }
    }
}

fn join_err(e: tokio::task::JoinError) -> LogifyError {
    LogifyError::Broker(format!("blocking task failed: {}", e))
}

#[async_trait]
impl Broker for FileBroker {
    async fn create_topic(&self, name: &str, config: &TopicConfig) -> Result<()> {
        validate_name(name)?;
        if config.partitions == 0 {
            return Err(LogifyError::Broker("topic needs at least one partition".into()));
        }
        if config.replication_factor != 1 {
            return Err(LogifyError::Broker(format!(
                "replication factor {} exceeds available brokers (1)",
                config.replication_factor
            )));
        }
        if config.cleanup_policy != CleanupPolicy::Delete {
            return Err(LogifyError::Broker(
                "only the 'delete' cleanup policy is supported".into(),
            ));
        }
        if config.segment_bytes == 0 || config.max_message_bytes == 0 {
            return Err(LogifyError::Broker(
                "segment and message size limits must be positive".into(),
            ));
        }

        let _guard = self.create_lock.lock().map_err(lock_err)?;
        if self.topics.contains_key(name) {
            return Err(LogifyError::TopicAlreadyExists(name.to_string()));
        }

        let dir = self.topics_dir.join(name);
        fs::create_dir_all(&dir)?;
        let tmp = dir.join(format!("{}.tmp", TOPIC_META_FILE));
        fs::write(&tmp, serde_json::to_vec_pretty(config)?)?;
        fs::rename(&tmp, dir.join(TOPIC_META_FILE))?;

        let log = TopicLog::open(&dir, config.clone())?;
        self.topics.insert(name.to_string(), Arc::new(log));

        tracing::info!(
            "[BROKER] created topic {} (partitions={}, retention_ms={})",
            name,
            config.partitions,
            config.retention_ms
        );
        Ok(())
    }

    async fn list_topics(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.topics.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn partition_count(&self, topic: &str) -> Result<u32> {
        Ok(self.topic(topic)?.config.partitions)
    }

    async fn produce(&self, topic: &str, payload: &[u8]) -> Result<Delivery> {
        let log = self.topic(topic)?;
        if payload.len() > log.config.max_message_bytes {
            return Err(LogifyError::MessageTooLarge {
                size: payload.len(),
                max: log.config.max_message_bytes,
            });
        }

        let partition =
            (log.next_partition.fetch_add(1, Ordering::Relaxed) % log.partitions.len() as u64) as u32;
        let part = log.partition(topic, partition)?;
        let bytes = payload.to_vec();
        let offset = tokio::task::spawn_blocking(move || part.append(&bytes))
            .await
            .map_err(join_err)??;

        Ok(Delivery {
            topic: topic.to_string(),
            partition,
            offset,
        })
    }

    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_records: usize,
    ) -> Result<Vec<ConsumedRecord>> {
        let part = self.topic(topic)?.partition(topic, partition)?;
        let topic = topic.to_string();
        tokio::task::spawn_blocking(move || {
            part.read_from(&topic, partition, from_offset, max_records)
        })
        .await
        .map_err(join_err)?
    }

    async fn earliest_offset(&self, topic: &str, partition: u32) -> Result<u64> {
        self.topic(topic)?.partition(topic, partition)?.earliest_offset()
    }

    async fn committed_offset(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
    ) -> Result<Option<u64>> {
        validate_name(group)?;
        Ok(self.load_offsets(group, topic)?.get(&partition).copied())
    }

    async fn commit_offset(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: u64,
    ) -> Result<()> {
        validate_name(group)?;
        let _guard = self.offsets_lock.lock().map_err(lock_err)?;

        let mut map = self.load_offsets(group, topic)?;
        if map.get(&partition) == Some(&next_offset) {
            return Ok(());
        }
        map.insert(partition, next_offset);

        let path = self.offsets_path(group, topic);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&map)?)?;
        fs::rename(&tmp, &path)?;

        self.offsets
            .insert((group.to_string(), topic.to_string()), map);
        Ok(())
    }
}
