//! Test doubles for notification backends.

use super::{Notifier, NotifyError};
use crate::db::TargetStats;

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Backend that records what it was asked to send.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub disabled: bool,
    pub failing: bool,
    pub sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, entry: String) -> Result<(), NotifyError> {
        if self.failing {
            return Err(NotifyError::Status(502));
        }
        self.sent.lock().unwrap().push(entry);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_enabled(&self) -> bool {
        !self.disabled
    }

    async fn send_down(&self, target_name: &str, _url: &str, message: &str) -> Result<(), NotifyError> {
        self.record(format!("down:{}:{}", target_name, message))
    }

    async fn send_up(&self, target_name: &str, _url: &str, downtime: Duration) -> Result<(), NotifyError> {
        self.record(format!("up:{}:{}", target_name, downtime.as_secs()))
    }

    async fn send_summary(&self, stats: &[TargetStats]) -> Result<(), NotifyError> {
        self.record(format!("summary:{}", stats.len()))
    }
}
