use crate::error::{LogifyError, Result};
use crate::partition::PartitionDate;
use std::path::PathBuf;
use std::time::Duration;

/// Which document store backs the partitioned indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// In-process store. Not durable; development and tests only.
    Memory,
    /// OpenSearch / Elasticsearch-compatible REST cluster.
    OpenSearch,
}

impl StoreKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreKind::Memory),
            "opensearch" | "elasticsearch" | "es" => Ok(StoreKind::OpenSearch),
            other => Err(LogifyError::Config(format!(
                "Unknown store '{}', expected 'memory' or 'opensearch'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::OpenSearch => "opensearch",
        }
    }
}

/// Connection settings for the OpenSearch store.
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub request_timeout: Duration,
}

/// Pipeline configuration, loaded from `LOGIFY_*` environment variables.
#[derive(Debug, Clone)]
pub struct LogifyConfig {
    /// Root directory for broker topics and consumer offsets.
    pub data_dir: PathBuf,
    pub bind_addr: String,
    /// Prefix shared by every project topic (`{namespace}-{project_id}`).
    pub topic_namespace: String,
    pub consumer_group: String,
    pub store: StoreKind,
    pub opensearch: OpenSearchConfig,
    /// Fixed index used by the service directory.
    pub catalog_index: String,
    pub catalog_registration: bool,
    pub partition_date: PartitionDate,
    pub poll_interval: Duration,
    pub poll_max_records: usize,
    pub discovery_interval: Duration,
    pub retention_check_interval: Duration,
    pub services_agg_size: usize,
    pub max_body_mb: usize,
    /// Identifies this process in logs and health output.
    pub node_id: String,
}

fn default_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

impl Default for LogifyConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:8080".to_string(),
            topic_namespace: "logify".to_string(),
            consumer_group: "logify-indexer".to_string(),
            store: StoreKind::Memory,
            opensearch: OpenSearchConfig {
                url: "http://localhost:9200".to_string(),
                username: None,
                password: None,
                request_timeout: Duration::from_secs(10),
            },
            catalog_index: "logify-catalog".to_string(),
            catalog_registration: true,
            partition_date: PartitionDate::ProcessingTime,
            poll_interval: Duration::from_millis(250),
            poll_max_records: 500,
            discovery_interval: Duration::from_secs(30),
            retention_check_interval: Duration::from_secs(3600),
            services_agg_size: 1000,
            max_body_mb: 10,
            node_id: default_node_id(),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| LogifyError::Config(format!("Invalid value for {}: {}", key, raw))),
        None => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env_string(key)
        .map(|v| v != "false" && v != "0")
        .unwrap_or(default)
}

impl LogifyConfig {
    /// Load config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let store = match env_string("LOGIFY_STORE") {
            Some(v) => StoreKind::parse(&v)?,
            None => defaults.store,
        };
        let partition_date = match env_string("LOGIFY_PARTITION_BY") {
            Some(v) => PartitionDate::parse(&v)?,
            None => defaults.partition_date,
        };

        let topic_namespace =
            env_string("LOGIFY_TOPIC_NAMESPACE").unwrap_or(defaults.topic_namespace);
        if topic_namespace.contains('/') || topic_namespace.contains('\\') {
            return Err(LogifyError::Config(format!(
                "LOGIFY_TOPIC_NAMESPACE must not contain path separators: {}",
                topic_namespace
            )));
        }

        let poll_max_records = env_parse("LOGIFY_POLL_MAX_RECORDS", defaults.poll_max_records)?;
        if poll_max_records == 0 {
            return Err(LogifyError::Config(
                "LOGIFY_POLL_MAX_RECORDS must be greater than 0".into(),
            ));
        }

        Ok(Self {
            data_dir: env_string("LOGIFY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            bind_addr: env_string("LOGIFY_BIND_ADDR").unwrap_or(defaults.bind_addr),
            topic_namespace,
            consumer_group: env_string("LOGIFY_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            store,
            opensearch: OpenSearchConfig {
                url: env_string("LOGIFY_OPENSEARCH_URL").unwrap_or(defaults.opensearch.url),
                username: env_string("LOGIFY_OPENSEARCH_USERNAME"),
                password: env_string("LOGIFY_OPENSEARCH_PASSWORD"),
                request_timeout: Duration::from_secs(env_parse(
                    "LOGIFY_OPENSEARCH_TIMEOUT_SECS",
                    10u64,
                )?),
            },
            catalog_index: env_string("LOGIFY_CATALOG_INDEX").unwrap_or(defaults.catalog_index),
            catalog_registration: env_bool(
                "LOGIFY_CATALOG_REGISTRATION",
                defaults.catalog_registration,
            ),
            partition_date,
            poll_interval: Duration::from_millis(env_parse("LOGIFY_POLL_INTERVAL_MS", 250u64)?),
            poll_max_records,
            discovery_interval: Duration::from_secs(env_parse(
                "LOGIFY_DISCOVERY_INTERVAL_SECS",
                30u64,
            )?),
            retention_check_interval: Duration::from_secs(env_parse(
                "LOGIFY_RETENTION_CHECK_SECS",
                3600u64,
            )?),
            services_agg_size: env_parse("LOGIFY_SERVICES_AGG_SIZE", defaults.services_agg_size)?,
            max_body_mb: env_parse("LOGIFY_MAX_BODY_MB", defaults.max_body_mb)?,
            node_id: env_string("LOGIFY_NODE_ID").unwrap_or(defaults.node_id),
        })
    }

    /// Directory holding broker topics.
    pub fn topics_dir(&self) -> PathBuf {
        self.data_dir.join("topics")
    }

    /// Directory holding committed consumer-group offsets.
    pub fn groups_dir(&self) -> PathBuf {
        self.data_dir.join("groups")
    }

    /// Regex matching every project topic in the ingestion namespace.
    pub fn topic_pattern(&self) -> String {
        format!("^{}-.+", regex::escape(&self.topic_namespace))
    }
}
