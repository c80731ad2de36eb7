//! Fan-out of alerts to notification backends.

use super::{Alert, NotifyError};
use crate::db::TargetStats;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// A notification backend.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    async fn send_down(&self, target_name: &str, url: &str, message: &str) -> Result<(), NotifyError>;

    async fn send_up(&self, target_name: &str, url: &str, downtime: Duration) -> Result<(), NotifyError>;

    async fn send_summary(&self, stats: &[TargetStats]) -> Result<(), NotifyError>;
}

/// Delivers every alert to all enabled backends concurrently.
///
/// A failing backend is logged and skipped; it never delays or fails
/// delivery to the others.
#[derive(Clone, Default)]
pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    fn enabled(&self) -> impl Iterator<Item = &Arc<dyn Notifier>> {
        self.notifiers.iter().filter(|n| n.is_enabled())
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled().count()
    }

    pub async fn dispatch(&self, alert: &Alert) {
        match alert {
            Alert::Down {
                target_name,
                url,
                message,
            } => self.send_down(target_name, url, message).await,
            Alert::Up {
                target_name,
                url,
                downtime,
            } => self.send_up(target_name, url, *downtime).await,
        }
    }

    pub async fn send_down(&self, target_name: &str, url: &str, message: &str) {
        tracing::warn!("Dispatcher: Sending down alert for {}: {}", target_name, message);

        let sends = self.enabled().map(|n| async move {
            if let Err(e) = n.send_down(target_name, url, message).await {
                tracing::error!("Dispatcher: {} failed to send down alert: {}", n.name(), e);
            }
        });
        join_all(sends).await;
    }

    pub async fn send_up(&self, target_name: &str, url: &str, downtime: Duration) {
        tracing::info!(
            "Dispatcher: Sending up alert for {} (downtime: {})",
            target_name,
            super::format_downtime(downtime)
        );

        let sends = self.enabled().map(|n| async move {
            if let Err(e) = n.send_up(target_name, url, downtime).await {
                tracing::error!("Dispatcher: {} failed to send up alert: {}", n.name(), e);
            }
        });
        join_all(sends).await;
    }

    pub async fn send_summary(&self, stats: &[TargetStats]) {
        tracing::info!("Dispatcher: Sending summary report for {} targets", stats.len());

        let sends = self.enabled().map(|n| async move {
            if let Err(e) = n.send_summary(stats).await {
                tracing::error!("Dispatcher: {} failed to send summary: {}", n.name(), e);
            }
        });
        join_all(sends).await;
    }
}
