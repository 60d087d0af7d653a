//! Bounded worker pool
//!
//! A fixed number of tokio tasks pull jobs from one bounded queue. Submitting
//! never waits: when the queue is full the job is rejected and the caller
//! decides whether to log or drop it.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type Job = BoxFuture<'static, ()>;

/// Reasons a job was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker queue is full")]
    QueueFull,

    #[error("worker pool is stopped")]
    Stopped,
}

pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    cancel: CancellationToken,
    workers: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks sharing a queue of `queue_size` jobs.
    ///
    /// Must be called from within a tokio runtime. Zero values are raised to one.
    pub fn new(workers: usize, queue_size: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(queue_size.max(1));
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let cancel = CancellationToken::new();

        let handles = (0..workers)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let cancel = cancel.clone();
                tokio::spawn(run_worker(worker_id, receiver, cancel))
            })
            .collect();

        debug!(workers, queue_size, "Worker pool started");

        Self {
            sender,
            cancel,
            workers,
            handles: Mutex::new(handles),
        }
    }

    pub fn new_shared(workers: usize, queue_size: usize) -> Arc<Self> {
        Arc::new(Self::new(workers, queue_size))
    }

    /// Queue a job without waiting
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(PoolError::Stopped);
        }
        self.sender.try_send(job.boxed()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PoolError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PoolError::Stopped,
        })
    }

    /// Stop the workers. Queued jobs that have not started are dropped.
    pub fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        for handle in self.handles.lock().drain(..) {
            // Workers see the token between jobs; a job in flight is aborted.
            handle.abort();
        }
        debug!("Worker pool stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<AsyncMutex<mpsc::Receiver<Job>>>,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            () = cancel.cancelled() => break,
            job = async { receiver.lock().await.recv().await } => job,
        };

        let Some(job) = job else { break };

        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            warn!(worker_id, "Worker job panicked");
        }
    }
}
