//! Retention manager for cleaning up old data.

use super::TaskHandle;
use crate::db::ResultSink;

use std::sync::Arc;
use std::time::Duration;

/// How often old logs are purged.
pub const RETENTION_PERIOD: Duration = Duration::from_secs(3600);

/// Manager for deleting logs past the retention period.
pub struct RetentionManager {
    sink: Arc<dyn ResultSink>,
    retention_days: u32,
    period: Duration,
    task: TaskHandle,
}

impl RetentionManager {
    pub fn new(sink: Arc<dyn ResultSink>, retention_days: u32) -> Self {
        Self::with_period(sink, retention_days, RETENTION_PERIOD)
    }

    pub fn with_period(sink: Arc<dyn ResultSink>, retention_days: u32, period: Duration) -> Self {
        Self {
            sink,
            retention_days,
            period,
            task: TaskHandle::default(),
        }
    }

    /// Start the retention manager background task. The first purge runs
    /// immediately.
    pub async fn start(&self) {
        let sink = self.sink.clone();
        let retention_days = self.retention_days;
        let period = self.period;
        let cancel = self.task.token();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        process_retention(sink.as_ref(), retention_days);
                    }
                }
            }
        });
        self.task.set(handle).await;
    }

    /// Stop the retention manager.
    pub async fn stop(&self) {
        self.task.stop().await;
    }
}

fn process_retention(sink: &dyn ResultSink, retention_days: u32) {
    match sink.purge(retention_days) {
        Ok(0) => {}
        Ok(deleted) => tracing::info!(
            "RetentionManager: Deleted {} logs older than {} days",
            deleted,
            retention_days
        ),
        Err(e) => tracing::error!("RetentionManager: Failed to purge old logs: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MonitorLog, Store};
    use chrono::{Duration as ChronoDuration, Utc};
    use tempfile::NamedTempFile;

    fn log(age_days: i64) -> MonitorLog {
        MonitorLog {
            id: 0,
            website_name: "api".to_string(),
            url: "https://api.example".to_string(),
            status: 200,
            response_time: 1000,
            is_up: true,
            error: None,
            message: String::new(),
            timestamp: Utc::now() - ChronoDuration::days(age_days),
        }
    }

    #[tokio::test]
    async fn test_retention_purges_on_start() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        store.save(&log(10)).unwrap();
        store.save(&log(1)).unwrap();

        let manager = RetentionManager::new(store.clone(), 7);
        manager.start().await;

        let mut remaining = store.count_logs().unwrap();
        for _ in 0..50 {
            if remaining == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            remaining = store.count_logs().unwrap();
        }
        assert_eq!(remaining, 1);

        manager.stop().await;
        manager.stop().await;
    }
}
