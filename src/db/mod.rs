//! Database module for Vigil.
//!
//! Provides SQLite storage for probe outcomes and the statistics derived from
//! them.

mod models;
mod store;

pub use models::*;
pub use store::*;

use std::time::Duration;

/// Where probe outcomes go, and where statistics come from.
pub trait ResultSink: Send + Sync {
    fn save(&self, log: &MonitorLog) -> Result<(), DbError>;

    fn save_batch(&self, logs: &[MonitorLog]) -> Result<(), DbError> {
        for log in logs {
            self.save(log)?;
        }
        Ok(())
    }

    /// Most recent logs for a target, newest first.
    fn logs(&self, target_name: &str, limit: usize) -> Result<Vec<MonitorLog>, DbError>;

    fn stats(&self, target_name: &str, window: Duration) -> Result<TargetStats, DbError>;

    fn all_stats(&self, window: Duration) -> Result<Vec<TargetStats>, DbError>;

    /// Delete logs older than the given number of days, returning how many
    /// were removed.
    fn purge(&self, older_than_days: u32) -> Result<usize, DbError>;
}
