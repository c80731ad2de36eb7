//! HTTP request handlers.

use super::AppState;
use crate::db::TargetStats;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use chrono::Local;
use serde::Deserialize;
use std::time::Duration;

// ============================================================================
// Templates
// ============================================================================

const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");
const LAYOUT_TEMPLATE: &str = include_str!("templates/layout.html");

const DAY: Duration = Duration::from_secs(24 * 3600);

// ============================================================================
// Dashboard
// ============================================================================

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let stats = match state.sink.all_stats(DAY) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Dashboard: Failed to load stats: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get stats").into_response();
        }
    };

    let cards = if stats.is_empty() {
        "<div class=\"stat-card\"><h3>No Data Available</h3>\
         <p>No monitoring data found. Check if monitoring is running.</p></div>"
            .to_string()
    } else {
        stats.iter().map(render_card).collect::<Vec<_>>().join("\n")
    };

    let content = DASHBOARD_TEMPLATE
        .replace("{{cards}}", &cards)
        .replace("{{updated}}", &Local::now().format("%Y-%m-%d %H:%M:%S").to_string());

    let page = LAYOUT_TEMPLATE
        .replace("{{title}}", "Vigil Dashboard")
        .replace("{{content}}", &content);

    Html(page).into_response()
}

fn render_card(stat: &TargetStats) -> String {
    let (class, label) = match stat.last_status.as_deref() {
        Some("UP") => ("status-up", "UP"),
        _ => ("status-down", "DOWN"),
    };
    let last_check = stat
        .last_check
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    let metric = |label: &str, value: &str| {
        format!(
            "<div class=\"metric\"><span class=\"metric-label\">{}:</span>\
             <span class=\"metric-value\">{}</span></div>",
            label, value
        )
    };

    format!(
        "<div class=\"stat-card\"><h3>{}</h3>\
         <div class=\"metric\"><span class=\"metric-label\">Status:</span>\
         <span class=\"metric-value {}\">{}</span></div>{}{}{}{}{}</div>",
        escape_html(&stat.target_name),
        class,
        label,
        metric("URL", &escape_html(&stat.url)),
        metric("Uptime (24h)", &format!("{:.2}%", stat.uptime_percent)),
        metric("Avg Response", &format!("{}ms", stat.avg_response_time_ms)),
        metric("Total Checks", &stat.total_checks.to_string()),
        metric("Last Check", &last_check),
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// API: Stats
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Window in hours (default: 24)
    #[serde(default)]
    pub duration: Option<u64>,
}

pub async fn handle_get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> impl IntoResponse {
    let hours = query.duration.filter(|h| *h > 0).unwrap_or(24);
    let Some(secs) = hours.checked_mul(3600) else {
        return (StatusCode::BAD_REQUEST, "duration out of range").into_response();
    };

    match state.sink.all_stats(Duration::from_secs(secs)) {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Logs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn handle_get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    let website = match query.website.filter(|w| !w.is_empty()) {
        Some(w) => w,
        None => return (StatusCode::BAD_REQUEST, "website parameter required").into_response(),
    };
    let limit = query.limit.unwrap_or(50);

    match state.sink.logs(&website, limit) {
        Ok(logs) => Json(logs).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
