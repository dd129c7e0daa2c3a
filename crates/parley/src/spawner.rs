//! How connection workers get an execution context.
//!
//! The listener never calls `tokio::spawn` directly; it hands each worker
//! to a [`WorkerSpawner`]. Swapping the spawner changes the concurrency
//! model without touching routing.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Starts connection workers.
pub trait WorkerSpawner: Send + Sync + 'static {
    /// Starts `worker` in the background.
    ///
    /// May wait before starting it (for capacity, say) but never waits for
    /// it to finish.
    fn spawn<F>(&self, worker: F) -> impl Future<Output = ()> + Send
    where
        F: Future<Output = ()> + Send + 'static;
}

/// One Tokio task per worker, no limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl WorkerSpawner for TokioSpawner {
    async fn spawn<F>(&self, worker: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(worker);
    }
}

/// At most `max_workers` workers at a time.
///
/// When all slots are taken, `spawn` waits, which stalls the accept loop;
/// further clients queue in the listen backlog.
#[derive(Debug, Clone)]
pub struct BoundedSpawner {
    permits: Arc<Semaphore>,
}

impl BoundedSpawner {
    pub fn new(max_workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_workers.max(1))),
        }
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl WorkerSpawner for BoundedSpawner {
    async fn spawn<F>(&self, worker: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
            tracing::error!("worker semaphore closed, dropping connection");
            return;
        };
        tokio::spawn(async move {
            worker.await;
            drop(permit);
        });
    }
}
