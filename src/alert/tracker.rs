//! Per-target availability tracking.

use super::Dispatcher;
use crate::probe::ProbeOutcome;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A transition worth telling someone about.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    Down {
        target_name: String,
        url: String,
        message: String,
    },
    Up {
        target_name: String,
        url: String,
        downtime: Duration,
    },
}

/// What we remember about a target between outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetState {
    pub up: bool,
    pub last_up: DateTime<Utc>,
    pub last_down: DateTime<Utc>,
    /// Unset until the first alert for this target.
    pub last_alert: Option<DateTime<Utc>>,
}

/// Up/down state machine over every target seen so far.
#[derive(Debug, Default)]
pub struct AvailabilityTracker {
    states: HashMap<String, TargetState>,
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, target_name: &str) -> Option<&TargetState> {
        self.states.get(target_name)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Apply an outcome and return the alert it triggers, if any.
    pub fn observe(&mut self, outcome: &ProbeOutcome) -> Option<Alert> {
        self.observe_at(outcome, Utc::now())
    }

    pub fn observe_at(&mut self, outcome: &ProbeOutcome, now: DateTime<Utc>) -> Option<Alert> {
        let Some(state) = self.states.get_mut(&outcome.target_name) else {
            // First sighting sets the baseline; never alert on it.
            tracing::info!(
                "Tracker: Initialized state for {}: up={}",
                outcome.target_name,
                outcome.up
            );
            self.states.insert(
                outcome.target_name.clone(),
                TargetState {
                    up: outcome.up,
                    last_up: now,
                    last_down: now,
                    last_alert: None,
                },
            );
            return None;
        };

        match (state.up, outcome.up) {
            (false, true) => {
                let downtime = (now - state.last_down).to_std().unwrap_or_default();
                state.up = true;
                state.last_up = now;
                state.last_alert = Some(now);
                Some(Alert::Up {
                    target_name: outcome.target_name.clone(),
                    url: outcome.url.clone(),
                    downtime,
                })
            }
            (true, false) => {
                state.up = false;
                state.last_down = now;
                state.last_alert = Some(now);
                Some(Alert::Down {
                    target_name: outcome.target_name.clone(),
                    url: outcome.url.clone(),
                    message: outcome.message.clone(),
                })
            }
            (false, false) => {
                // One-shot escalation for targets that were already down at
                // baseline. Once an alert has gone out it is never repeated.
                if state.last_alert.is_some() {
                    return None;
                }
                tracing::info!(
                    "Tracker: {} still down, sending delayed alert",
                    outcome.target_name
                );
                state.last_alert = Some(now);
                Some(Alert::Down {
                    target_name: outcome.target_name.clone(),
                    url: outcome.url.clone(),
                    message: outcome.message.clone(),
                })
            }
            (true, true) => None,
        }
    }
}

/// Consume outcomes until the stream closes, dispatching any alerts.
///
/// This task is the only owner of the tracker, so per-target updates are
/// applied in the order outcomes arrive.
pub async fn run_tracker(
    mut rx: mpsc::UnboundedReceiver<ProbeOutcome>,
    dispatcher: Arc<Dispatcher>,
) -> AvailabilityTracker {
    let mut tracker = AvailabilityTracker::new();

    while let Some(outcome) = rx.recv().await {
        if let Some(alert) = tracker.observe(&outcome) {
            dispatcher.dispatch(&alert).await;
        }
    }

    tracing::info!("Tracker: Outcome stream closed, tracking {} targets", tracker.len());
    tracker
}
