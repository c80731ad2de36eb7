//! Alerting: availability tracking and notification fan-out.

mod dispatcher;
mod telegram;
mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::*;
pub use telegram::*;
pub use tracker::*;

use thiserror::Error;

/// Notification error types.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to send notification: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notification API returned status {0}")]
    Status(u16),
}

/// Render a duration the way people read downtime: `1h 2m 3s`.
pub fn format_downtime(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}
