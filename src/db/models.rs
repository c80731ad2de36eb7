//! Database model types.

use crate::probe::ProbeOutcome;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted probe outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorLog {
    pub id: i64,
    pub website_name: String,
    pub url: String,
    pub status: u16,
    /// Response time in microseconds.
    pub response_time: i64,
    pub is_up: bool,
    pub error: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&ProbeOutcome> for MonitorLog {
    fn from(outcome: &ProbeOutcome) -> Self {
        Self {
            id: 0,
            website_name: outcome.target_name.clone(),
            url: outcome.url.clone(),
            status: outcome.status,
            response_time: outcome.response_time.as_micros() as i64,
            is_up: outcome.up,
            error: outcome.error.as_ref().map(|e| e.to_string()),
            message: outcome.message.clone(),
            timestamp: outcome.timestamp,
        }
    }
}

/// Aggregated statistics for one target over a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetStats {
    pub target_name: String,
    pub url: String,
    pub total_checks: i64,
    pub successful_checks: i64,
    pub uptime_percent: f64,
    /// Whole milliseconds.
    pub avg_response_time_ms: i64,
    pub last_check: Option<DateTime<Utc>>,
    /// `UP` or `DOWN`, unset when there were no checks.
    pub last_status: Option<String>,
}
