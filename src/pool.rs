//! Bounded worker pool that runs probes concurrently.
//!
//! Jobs enter through a bounded queue shared by a fixed number of workers.
//! Outcomes leave through a bounded results stream which closes once the pool
//! has been closed and every worker has exited.

use crate::probe::{Probe, ProbeOutcome, TargetSpec};

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub job_capacity: usize,
    pub result_capacity: usize,
    /// Deadline for targets that do not set their own timeout.
    pub default_timeout: Duration,
}

impl PoolConfig {
    /// Queue capacities default to twice the worker count.
    pub fn new(workers: usize, default_timeout: Duration) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            job_capacity: workers * 2,
            result_capacity: workers * 2,
            default_timeout,
        }
    }
}

/// Fixed-size pool of probe executors.
pub struct WorkerPool {
    config: PoolConfig,
    probe: Arc<dyn Probe>,
    cancel: CancellationToken,
    jobs_tx: Mutex<Option<mpsc::Sender<TargetSpec>>>,
    jobs_rx: Arc<AsyncMutex<mpsc::Receiver<TargetSpec>>>,
    results_tx: Mutex<Option<mpsc::Sender<ProbeOutcome>>>,
    results_rx: Mutex<Option<mpsc::Receiver<ProbeOutcome>>>,
    handles: AsyncMutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, probe: Arc<dyn Probe>) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel(config.job_capacity.max(1));
        let (results_tx, results_rx) = mpsc::channel(config.result_capacity.max(1));

        Self {
            config,
            probe,
            cancel: CancellationToken::new(),
            jobs_tx: Mutex::new(Some(jobs_tx)),
            jobs_rx: Arc::new(AsyncMutex::new(jobs_rx)),
            results_tx: Mutex::new(Some(results_tx)),
            results_rx: Mutex::new(Some(results_rx)),
            handles: AsyncMutex::new(Vec::new()),
        }
    }

    /// Spawn the workers. Must be called exactly once.
    pub async fn start(&self) {
        let results_tx = match self.results_tx.lock().unwrap().clone() {
            Some(tx) => tx,
            None => {
                tracing::warn!("WorkerPool: start called after close");
                return;
            }
        };

        let mut handles = self.handles.lock().await;
        for id in 0..self.config.workers {
            handles.push(tokio::spawn(run_worker(
                id,
                self.probe.clone(),
                self.jobs_rx.clone(),
                results_tx.clone(),
                self.cancel.clone(),
                self.config.default_timeout,
            )));
        }

        tracing::info!("WorkerPool: Started {} workers", self.config.workers);
    }

    /// Take the results stream. Returns `None` if it was already taken.
    pub fn take_results(&self) -> Option<mpsc::Receiver<ProbeOutcome>> {
        self.results_rx.lock().unwrap().take()
    }

    /// Queue a target for probing, waiting for a free slot.
    ///
    /// Returns `false` when the job was dropped because the pool is shutting
    /// down.
    pub async fn submit(&self, target: TargetSpec) -> bool {
        let tx = match self.jobs_tx.lock().unwrap().clone() {
            Some(tx) => tx,
            None => return false,
        };

        let name = target.name.clone();
        let accepted = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            res = tx.send(target) => res.is_ok(),
        };

        if !accepted {
            tracing::debug!("WorkerPool: Dropped job for {} during shutdown", name);
        }
        accepted
    }

    /// Whether shutdown has begun.
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Shut the pool down and close the results stream.
    ///
    /// In-flight requests are aborted and their outcomes discarded. Safe to
    /// call more than once; later calls return immediately.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.jobs_tx.lock().unwrap().take();

        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("WorkerPool: Worker exited abnormally: {}", e);
            }
        }

        if self.results_tx.lock().unwrap().take().is_some() {
            tracing::info!("WorkerPool: Closed");
        }
    }
}

async fn run_worker(
    id: usize,
    probe: Arc<dyn Probe>,
    jobs: Arc<AsyncMutex<mpsc::Receiver<TargetSpec>>>,
    results: mpsc::Sender<ProbeOutcome>,
    cancel: CancellationToken,
    default_timeout: Duration,
) {
    loop {
        let job = {
            let mut rx = jobs.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                job = rx.recv() => job,
            }
        };

        let Some(target) = job else {
            break;
        };

        let deadline = target.timeout.unwrap_or(default_timeout);
        tracing::debug!("Worker {}: Checking {} (deadline {:?})", id, target.name, deadline);

        let outcome = probe.probe(&target, deadline, &cancel).await;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Worker {}: Discarding result for {} during shutdown", id, target.name);
                break;
            }
            res = results.send(outcome) => {
                if res.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Worker {}: Exiting", id);
}
