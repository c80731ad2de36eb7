//! Scheduler module for triggering probe rounds and periodic housekeeping.

mod retention;
mod summary;

pub use retention::*;
pub use summary::*;

use crate::pool::WorkerPool;
use crate::probe::TargetSpec;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A spawned background loop that can be stopped and awaited.
#[derive(Default)]
pub struct TaskHandle {
    cancel: CancellationToken,
    handle: AsyncMutex<Option<JoinHandle<()>>>,
}

impl TaskHandle {
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn set(&self, handle: JoinHandle<()>) {
        *self.handle.lock().await = Some(handle);
    }

    /// Signal the loop and wait for it to exit. Safe to call repeatedly.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Background task exited abnormally: {}", e);
            }
        }
    }
}

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Submits every target to the worker pool at startup and then once per
/// interval.
pub struct Scheduler {
    pool: Arc<WorkerPool>,
    targets: Arc<RwLock<Vec<TargetSpec>>>,
    interval: Duration,
    state: Mutex<SchedulerState>,
    task: TaskHandle,
}

impl Scheduler {
    pub fn new(pool: Arc<WorkerPool>, targets: Vec<TargetSpec>, interval: Duration) -> Self {
        Self {
            pool,
            targets: Arc::new(RwLock::new(targets)),
            interval,
            state: Mutex::new(SchedulerState::Idle),
            task: TaskHandle::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap()
    }

    /// Replace the target list. Takes effect from the next round.
    pub async fn set_targets(&self, targets: Vec<TargetSpec>) {
        tracing::info!("Scheduler: Target list updated, {} websites", targets.len());
        *self.targets.write().await = targets;
    }

    #[cfg(test)]
    pub async fn targets(&self) -> Vec<TargetSpec> {
        self.targets.read().await.clone()
    }

    /// Run one round now and arm the periodic timer.
    pub async fn start(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state != SchedulerState::Idle {
                tracing::warn!("Scheduler: start called while {:?}", *state);
                return;
            }
            *state = SchedulerState::Running;
        }

        tracing::info!("Scheduler: Running a probe round every {:?}", self.interval);

        let handle = tokio::spawn(run_schedule(
            self.pool.clone(),
            self.targets.clone(),
            self.interval,
            self.task.token(),
        ));
        self.task.set(handle).await;
    }

    /// Stop triggering rounds and wait for the loop to exit.
    ///
    /// Probes already handed to the pool are left to finish.
    pub async fn stop(&self) {
        *self.state.lock().unwrap() = SchedulerState::Stopped;
        self.task.stop().await;
    }
}

async fn run_schedule(
    pool: Arc<WorkerPool>,
    targets: Arc<RwLock<Vec<TargetSpec>>>,
    period: Duration,
    cancel: CancellationToken,
) {
    // The first tick completes immediately, giving the startup round.
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut rounds = JoinSet::new();
    let mut round = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        while rounds.try_join_next().is_some() {}

        round += 1;
        let snapshot = targets.read().await.clone();
        rounds.spawn(run_round(round, pool.clone(), snapshot, cancel.clone()));
    }

    // Rounds blocked on back-pressure give up once cancelled.
    while rounds.join_next().await.is_some() {}
    tracing::info!("Scheduler: Stopped after {} rounds", round);
}

async fn run_round(
    round: u64,
    pool: Arc<WorkerPool>,
    targets: Vec<TargetSpec>,
    cancel: CancellationToken,
) {
    tracing::info!("Scheduler: Round {}: checking {} websites", round, targets.len());

    for target in targets {
        let accepted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            accepted = pool.submit(target) => accepted,
        };

        if !accepted {
            tracing::warn!("Scheduler: Round {} abandoned, worker pool is closed", round);
            return;
        }
    }
}
