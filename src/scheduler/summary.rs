//! Periodic summary reports.

use super::TaskHandle;
use crate::alert::Dispatcher;
use crate::db::ResultSink;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Sends uptime statistics for the last period, once per period.
pub struct SummaryReporter {
    sink: Arc<dyn ResultSink>,
    dispatcher: Arc<Dispatcher>,
    period: Duration,
    task: TaskHandle,
}

impl SummaryReporter {
    pub fn new(sink: Arc<dyn ResultSink>, dispatcher: Arc<Dispatcher>, period: Duration) -> Self {
        Self {
            sink,
            dispatcher,
            period,
            task: TaskHandle::default(),
        }
    }

    /// Start reporting. The first report goes out one full period after start.
    pub async fn start(&self) {
        let sink = self.sink.clone();
        let dispatcher = self.dispatcher.clone();
        let period = self.period;
        let cancel = self.task.token();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        match sink.all_stats(period) {
                            Ok(stats) => dispatcher.send_summary(&stats).await,
                            Err(e) => tracing::error!("SummaryReporter: Failed to load stats: {}", e),
                        }
                    }
                }
            }
        });
        self.task.set(handle).await;
    }

    pub async fn stop(&self) {
        self.task.stop().await;
    }
}
