use crate::broker::{Broker, FileBroker, TopicProvisioner};
use crate::config::LogifyConfig;
use crate::error::Result;
use crate::ingest::{
    ConsumerSupervisor, IndexWriter, IngestConsumer, LogPublisher, RestartPolicy, StatsSnapshot,
};
use crate::search::{BookmarkUpdater, SearchExecutor, ServiceDirectory};
use crate::store::{self, DocumentStore};
use crate::types::{Delivery, LogDocument, LogRecord, SearchRequest};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything the HTTP layer needs: the write path, the read path, and the
/// consumer that connects them.
pub struct LogService {
    config: LogifyConfig,
    file_broker: Option<Arc<FileBroker>>,
    store: Arc<dyn DocumentStore>,
    publisher: LogPublisher,
    executor: SearchExecutor,
    directory: ServiceDirectory,
    bookmarks: BookmarkUpdater,
    consumer: Arc<IngestConsumer>,
}

/// Handles to the tasks started by [`LogService::start`].
pub struct BackgroundTasks {
    cancel: CancellationToken,
    supervisor: ConsumerSupervisor,
    retention: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Stop the consumer (after it drains its batch) and the retention loop.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.supervisor.shutdown().await;
        if let Some(handle) = self.retention {
            if let Err(e) = handle.await {
                tracing::warn!("retention task ended abnormally: {}", e);
            }
        }
    }
}

impl LogService {
    /// Open the file broker under `config.data_dir` and the configured store.
    pub fn open(config: LogifyConfig) -> Result<Self> {
        let broker = FileBroker::open(&config.topics_dir(), &config.groups_dir())?;
        let store = store::from_config(&config)?;
        let mut service = Self::with_components(config, broker.clone(), store)?;
        service.file_broker = Some(broker);
        Ok(service)
    }

    pub fn with_components(
        config: LogifyConfig,
        broker: Arc<dyn Broker>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        let provisioner = Arc::new(TopicProvisioner::new(
            Arc::clone(&broker),
            config.topic_namespace.clone(),
        ));

        let mut writer = IndexWriter::new(Arc::clone(&store), config.partition_date);
        if config.catalog_registration {
            writer = writer.with_catalog(config.catalog_index.clone());
        }

        let consumer = IngestConsumer::new(
            Arc::clone(&broker),
            Arc::new(writer),
            &config,
            provisioner.provisioned(),
        )?;

        Ok(Self {
            publisher: LogPublisher::new(broker, provisioner),
            executor: SearchExecutor::new(Arc::clone(&store)),
            directory: ServiceDirectory::new(
                Arc::clone(&store),
                config.catalog_index.clone(),
                config.services_agg_size,
            ),
            bookmarks: BookmarkUpdater::new(Arc::clone(&store)),
            consumer: Arc::new(consumer),
            file_broker: None,
            store,
            config,
        })
    }

    /// Spawn the supervised consumer and, for the file broker, the retention
    /// sweep.
    pub fn start(&self, cancel: CancellationToken) -> BackgroundTasks {
        let consumer = Arc::clone(&self.consumer);
        let supervisor = ConsumerSupervisor::spawn(
            cancel.clone(),
            RestartPolicy::default(),
            move |token| {
                let consumer = Arc::clone(&consumer);
                async move { consumer.run(token).await }
            },
        );

        let retention = self.file_broker.as_ref().map(|broker| {
            tokio::spawn(
                Arc::clone(broker)
                    .run_retention_loop(self.config.retention_check_interval, cancel.clone()),
            )
        });

        BackgroundTasks {
            cancel,
            supervisor,
            retention,
        }
    }

    pub fn config(&self) -> &LogifyConfig {
        &self.config
    }

    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }

    pub fn consumer(&self) -> Arc<IngestConsumer> {
        Arc::clone(&self.consumer)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.consumer.stats().snapshot()
    }

    pub async fn publish(&self, record: &LogRecord) -> Result<Delivery> {
        self.publisher.publish(record).await
    }

    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<LogDocument>> {
        self.executor.search(req).await
    }

    pub async fn list_services(&self) -> Result<Vec<String>> {
        self.directory.list_services().await
    }

    pub async fn list_project_services(
        &self,
        tenant_id: &str,
        project_id: &str,
    ) -> Result<Vec<String>> {
        self.directory
            .list_project_services(tenant_id, project_id)
            .await
    }

    pub async fn bookmark(&self, log_id: &str, tenant_id: &str, project_id: &str) -> Result<()> {
        self.bookmarks.bookmark(log_id, tenant_id, project_id).await
    }
}
