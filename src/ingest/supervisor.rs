use crate::error::Result;
use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Keeps one long-running task alive until shutdown.
///
/// The task is restarted with exponential backoff (plus up to 25% jitter)
/// whenever it returns or panics before cancellation. A run that lasted longer
/// than `max_backoff` resets the backoff.
pub struct ConsumerSupervisor {
    cancel: CancellationToken,
    restarts: Arc<AtomicU64>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConsumerSupervisor {
    pub fn spawn<F, Fut>(cancel: CancellationToken, policy: RestartPolicy, task: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let restarts = Arc::new(AtomicU64::new(0));
        let handle = tokio::spawn(supervise(
            cancel.clone(),
            policy,
            Arc::clone(&restarts),
            task,
        ));
        Self {
            cancel,
            restarts,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Cancel the task and wait for it to drain.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!("[SUPERVISOR] supervisor task failed: {}", e);
            }
        }
    }
}

async fn supervise<F, Fut>(
    cancel: CancellationToken,
    policy: RestartPolicy,
    restarts: Arc<AtomicU64>,
    task: F,
) where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut backoff = policy.initial_backoff;
    loop {
        let started = Instant::now();
        let outcome = tokio::spawn(task(cancel.clone())).await;

        if cancel.is_cancelled() {
            if let Ok(Err(e)) = outcome {
                tracing::warn!("[SUPERVISOR] consumer exited with error during shutdown: {}", e);
            }
            break;
        }

        match outcome {
            Ok(Ok(())) => tracing::warn!("[SUPERVISOR] consumer exited unexpectedly"),
            Ok(Err(e)) => tracing::error!("[SUPERVISOR] consumer failed: {}", e),
            Err(e) => tracing::error!("[SUPERVISOR] consumer panicked: {}", e),
        }

        if started.elapsed() > policy.max_backoff {
            backoff = policy.initial_backoff;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 4);
        let delay = backoff + Duration::from_millis(jitter_ms);
        restarts.fetch_add(1, Ordering::Relaxed);
        tracing::info!("[SUPERVISOR] restarting consumer in {:?}", delay);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        backoff = (backoff * 2).min(policy.max_backoff);
    }
    tracing::info!("[SUPERVISOR] stopped");
}
