//! Wires the scheduler, worker pool and result consumers together.

use crate::alert::{run_tracker, AvailabilityTracker, Dispatcher};
use crate::db::{MonitorLog, ResultSink};
use crate::pool::WorkerPool;
use crate::probe::ProbeOutcome;
use crate::scheduler::Scheduler;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const FLUSH_THRESHOLD: usize = 100;

struct Consumers {
    fan_out: JoinHandle<()>,
    tracker: JoinHandle<AvailabilityTracker>,
    writer: JoinHandle<()>,
}

/// The running monitoring pipeline.
///
/// Outcomes reach the tracker and the writer over unbounded channels. The
/// tracker delivers alerts inline, so a notifier stuck until its timeout lets
/// the tracker's backlog grow by one round of outcomes per interval.
pub struct Monitor {
    pool: Arc<WorkerPool>,
    scheduler: Arc<Scheduler>,
    sink: Arc<dyn ResultSink>,
    dispatcher: Arc<Dispatcher>,
    consumers: Option<Consumers>,
}

impl Monitor {
    pub fn new(
        pool: Arc<WorkerPool>,
        scheduler: Arc<Scheduler>,
        sink: Arc<dyn ResultSink>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            pool,
            scheduler,
            sink,
            dispatcher,
            consumers: None,
        }
    }

    /// Start the consumers, the workers and then the scheduler.
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let results = self
            .pool
            .take_results()
            .ok_or("worker pool results stream already taken")?;

        let (tracker_tx, tracker_rx) = mpsc::unbounded_channel();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        self.consumers = Some(Consumers {
            fan_out: tokio::spawn(run_fan_out(results, vec![tracker_tx, writer_tx])),
            tracker: tokio::spawn(run_tracker(tracker_rx, self.dispatcher.clone())),
            writer: tokio::spawn(run_writer(writer_rx, self.sink.clone())),
        });

        self.pool.start().await;
        self.scheduler.start().await;

        tracing::info!("Monitor started");
        Ok(())
    }

    /// Stop in order: scheduler, pool, then the consumers once the results
    /// stream has drained. Returns the final availability state.
    pub async fn shutdown(mut self) -> Option<AvailabilityTracker> {
        self.scheduler.stop().await;
        self.pool.close().await;

        let consumers = self.consumers.take()?;
        if let Err(e) = consumers.fan_out.await {
            tracing::error!("Monitor: Fan-out task failed: {}", e);
        }
        if let Err(e) = consumers.writer.await {
            tracing::error!("Monitor: Result writer failed: {}", e);
        }

        let tracker = match consumers.tracker.await {
            Ok(tracker) => Some(tracker),
            Err(e) => {
                tracing::error!("Monitor: Availability tracker failed: {}", e);
                None
            }
        };

        tracing::info!("Monitor stopped");
        tracker
    }
}

/// Copy every outcome to each consumer's unbounded channel.
async fn run_fan_out(
    mut results: mpsc::Receiver<ProbeOutcome>,
    consumers: Vec<mpsc::UnboundedSender<ProbeOutcome>>,
) {
    while let Some(outcome) = results.recv().await {
        log_outcome(&outcome);
        for tx in &consumers {
            if tx.send(outcome.clone()).is_err() {
                tracing::warn!("Monitor: Consumer gone, dropping outcome for {}", outcome.target_name);
            }
        }
    }
}

fn log_outcome(outcome: &ProbeOutcome) {
    if outcome.up {
        tracing::info!(
            "UP {} ({}) - {} (time: {:?})",
            outcome.target_name,
            outcome.url,
            outcome.message,
            outcome.response_time
        );
    } else {
        tracing::warn!(
            "DOWN {} ({}) - {} (time: {:?})",
            outcome.target_name,
            outcome.url,
            outcome.message,
            outcome.response_time
        );
    }

    if let Some(e) = &outcome.error {
        tracing::warn!("   error: {}", e);
    }
}

/// Buffer outcomes and write them to the sink in batches.
async fn run_writer(mut rx: mpsc::UnboundedReceiver<ProbeOutcome>, sink: Arc<dyn ResultSink>) {
    let mut buffer: Vec<MonitorLog> = Vec::with_capacity(FLUSH_THRESHOLD);
    let mut interval = tokio::time::interval(FLUSH_INTERVAL);

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Some(outcome) => {
                        buffer.push(MonitorLog::from(&outcome));
                        if buffer.len() >= FLUSH_THRESHOLD {
                            flush_buffer(sink.as_ref(), &mut buffer);
                        }
                    }
                    None => {
                        // Stream closed, flush remaining and exit
                        flush_buffer(sink.as_ref(), &mut buffer);
                        break;
                    }
                }
            }
            _ = interval.tick() => {
                flush_buffer(sink.as_ref(), &mut buffer);
            }
        }
    }
}

fn flush_buffer(sink: &dyn ResultSink, buffer: &mut Vec<MonitorLog>) {
    if buffer.is_empty() {
        return;
    }

    if let Err(e) = sink.save_batch(buffer) {
        tracing::error!("Failed to save {} monitor logs: {}", buffer.len(), e);
    }

    buffer.clear();
}
