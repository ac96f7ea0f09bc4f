//! Bounded worker pools.
//!
//! Each pool is a bounded multi-consumer queue drained by a fixed number
//! of worker tasks. Enqueueing awaits when the queue is full, so callers
//! feel backpressure instead of the pool shedding work. Stopping a pool
//! closes the queue and waits for the workers to drain what was already
//! accepted.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::job::BalancerJob;

/// Queue capacity per pool.
const QUEUE_CAPACITY: usize = 1024;

type JobReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Arc<BalancerJob>>>>;

/// A fixed-size pool of job workers over one bounded queue.
pub struct TaskPool {
    name: &'static str,
    tx: Mutex<Option<mpsc::Sender<Arc<BalancerJob>>>>,
    rx: JobReceiver,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskPool {
    /// Creates a pool; no workers run until [`Self::start`].
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            name,
            tx: Mutex::new(Some(tx)),
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawns `count` workers, each running `process` per job.
    pub fn start<F, Fut>(&self, count: usize, process: F)
    where
        F: Fn(Arc<BalancerJob>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut workers = self.workers.lock();
        for _ in 0..count {
            let rx = self.rx.clone();
            let process = process.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    // Hold the receiver lock only for the take, not while
                    // processing, so the other workers keep draining.
                    let job = rx.lock().await.recv().await;
                    match job {
                        Some(job) => process(job).await,
                        None => break,
                    }
                }
            }));
        }
        debug!(pool = self.name, workers = count, "worker pool started");
    }

    /// Queues a job, awaiting if the queue is full.
    pub async fn enqueue(&self, job: Arc<BalancerJob>) -> Result<(), DispatchError> {
        let tx = self.tx.lock().clone();
        match tx {
            Some(tx) => tx.send(job).await.map_err(|_| DispatchError::Stopped),
            None => Err(DispatchError::Stopped),
        }
    }

    /// Number of jobs currently queued.
    pub fn depth(&self) -> usize {
        self.tx
            .lock()
            .as_ref()
            .map(|tx| QUEUE_CAPACITY - tx.capacity())
            .unwrap_or(0)
    }

    /// Number of running workers.
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Closes the queue and waits for the workers to drain it.
    pub async fn stop(&self) {
        drop(self.tx.lock().take());
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(pool = self.name, error = %e, "worker terminated abnormally");
            }
        }
        debug!(pool = self.name, "worker pool stopped");
    }
}
