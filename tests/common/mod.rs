#![allow(dead_code)]

use logify::{FileBroker, LogService, LogifyConfig, MemoryStore, StatsSnapshot};
use logify_http::handlers::AppState;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Config tuned for tests: tight poll and discovery loops, everything under `dir`.
pub fn test_config(dir: &std::path::Path) -> LogifyConfig {
    LogifyConfig {
        data_dir: dir.to_path_buf(),
        poll_interval: Duration::from_millis(10),
        discovery_interval: Duration::from_millis(50),
        ..Default::default()
    }
}

/// A service over a file broker in `dir` and a fresh in-memory store.
pub fn open_service(dir: &std::path::Path) -> Arc<LogService> {
    let config = test_config(dir);
    let broker = FileBroker::open(&config.topics_dir(), &config.groups_dir()).unwrap();
    let store = Arc::new(MemoryStore::new());
    Arc::new(LogService::with_components(config, broker, store).unwrap())
}

/// Poll the consumer stats until at least `n` records were indexed.
pub async fn wait_for_indexed(service: &LogService, n: u64) -> StatsSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let stats = service.stats();
        if stats.records_indexed >= n {
            return stats;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {} indexed records, stats: {:?}", n, stats);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub struct TestServer {
    pub addr: String,
    pub service: Arc<LogService>,
    pub cancel: CancellationToken,
    _tmp: TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Full HTTP stack on an ephemeral port with the consumer running.
pub async fn spawn_server() -> TestServer {
    let tmp = TempDir::new().unwrap();
    let service = open_service(tmp.path());
    let cancel = CancellationToken::new();
    let _background = service.start(cancel.clone());

    let app = logify_http::build_router(
        Arc::new(AppState {
            service: Arc::clone(&service),
        }),
        10,
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .unwrap();
    });

    TestServer {
        addr,
        service,
        cancel,
        _tmp: tmp,
    }
}
