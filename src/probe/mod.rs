//! Probe module for website monitoring.
//!
//! A probe performs one check against one target and always produces a
//! [`ProbeOutcome`], never an error: failures become a down verdict.

mod http;

pub use http::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default expected HTTP status when a target does not set one.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Probe error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("failed to create request: {0}")]
    Request(String),
    #[error("request failed: {0}")]
    Network(String),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("probe cancelled")]
    Cancelled,
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// A website to check, as handed to the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    pub name: String,
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub expected_status: u16,
    /// Substring that must appear in the response body.
    pub check_content: Option<String>,
    /// Overrides the pool's default timeout.
    pub timeout: Option<Duration>,
}

impl TargetSpec {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            expected_status: DEFAULT_EXPECTED_STATUS,
            check_content: None,
            timeout: None,
        }
    }
}

/// The result of a single probe.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub target_name: String,
    pub url: String,
    /// Observed HTTP status, 0 if no response was received.
    pub status: u16,
    pub response_time: Duration,
    pub up: bool,
    pub message: String,
    pub error: Option<ProbeError>,
    pub timestamp: DateTime<Utc>,
}

impl ProbeOutcome {
    /// Outcome for a probe that never got a usable response.
    pub fn failed(target: &TargetSpec, error: ProbeError, message: &str, elapsed: Duration) -> Self {
        Self {
            target_name: target.name.clone(),
            url: target.url.clone(),
            status: 0,
            response_time: elapsed,
            up: false,
            message: message.to_string(),
            error: Some(error),
            timestamp: Utc::now(),
        }
    }
}

/// Something that can check a target.
///
/// Implementations must honour both the deadline and the cancellation token,
/// returning a down outcome promptly when either fires.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(
        &self,
        target: &TargetSpec,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> ProbeOutcome;
}
