//! SQLite database store implementation.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use super::models::*;
use super::ResultSink;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;

        Ok(())
    }

    /// Total number of stored logs.
    #[cfg(test)]
    pub fn count_logs(&self) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM monitor_logs", [], |r| r.get(0))?)
    }
}

impl ResultSink for Store {
    fn save(&self, log: &MonitorLog) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        insert_log(&conn, log)?;
        Ok(())
    }

    fn save_batch(&self, logs: &[MonitorLog]) -> Result<(), DbError> {
        if logs.is_empty() {
            return Ok(());
        }

        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        for log in logs {
            insert_log(&tx, log)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn logs(&self, target_name: &str, limit: usize) -> Result<Vec<MonitorLog>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, website_name, url, status, response_time, is_up, error, message, timestamp
             FROM monitor_logs WHERE website_name = ?1
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
        )?;

        let logs = stmt
            .query_map(params![target_name, limit as i64], |row| {
                let time_str: String = row.get(8)?;
                Ok(MonitorLog {
                    id: row.get(0)?,
                    website_name: row.get(1)?,
                    url: row.get(2)?,
                    status: row.get(3)?,
                    response_time: row.get(4)?,
                    is_up: row.get(5)?,
                    error: row.get(6)?,
                    message: row.get(7)?,
                    timestamp: parse_db_time(&time_str).unwrap_or_else(Utc::now),
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(logs)
    }

    fn stats(&self, target_name: &str, window: Duration) -> Result<TargetStats, DbError> {
        let conn = self.conn.lock().unwrap();
        stats_since(&conn, target_name, &window_start(window))
    }

    fn all_stats(&self, window: Duration) -> Result<Vec<TargetStats>, DbError> {
        let since = window_start(window);
        let conn = self.conn.lock().unwrap();

        let names = {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT website_name FROM monitor_logs WHERE timestamp >= ?1 ORDER BY website_name",
            )?;
            let names = stmt
                .query_map(params![since], |row| row.get::<_, String>(0))?
                .collect::<SqlResult<Vec<_>>>()?;
            names
        };

        names
            .iter()
            .map(|name| stats_since(&conn, name, &since))
            .collect()
    }

    fn purge(&self, older_than_days: u32) -> Result<usize, DbError> {
        let cutoff = Utc::now() - ChronoDuration::days(older_than_days as i64);
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM monitor_logs WHERE timestamp < ?1",
            params![cutoff.format(TIME_FORMAT).to_string()],
        )?;
        Ok(deleted)
    }
}

fn insert_log(conn: &Connection, log: &MonitorLog) -> SqlResult<usize> {
    conn.execute(
        "INSERT INTO monitor_logs (website_name, url, status, response_time, is_up, error, message, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            log.website_name,
            log.url,
            log.status,
            log.response_time,
            log.is_up,
            log.error,
            log.message,
            log.timestamp.format(TIME_FORMAT).to_string(),
        ],
    )
}

/// Format the start of a window ending now, clamped to the earliest
/// representable time.
fn window_start(window: Duration) -> String {
    let since = ChronoDuration::from_std(window)
        .ok()
        .and_then(|w| Utc::now().checked_sub_signed(w))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    since.format(TIME_FORMAT).to_string()
}

fn stats_since(conn: &Connection, target_name: &str, since: &str) -> Result<TargetStats, DbError> {
    let (total_checks, successful_checks, avg_us, last_check): (i64, i64, Option<f64>, Option<String>) =
        conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN is_up = 1 THEN 1 ELSE 0 END), 0),
                    AVG(response_time),
                    MAX(timestamp)
             FROM monitor_logs WHERE website_name = ?1 AND timestamp >= ?2",
            params![target_name, since],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

    let latest: Option<(String, bool)> = conn
        .query_row(
            "SELECT url, is_up FROM monitor_logs WHERE website_name = ?1
             ORDER BY timestamp DESC, id DESC LIMIT 1",
            params![target_name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (url, last_up) = match latest {
        Some((url, is_up)) => (url, Some(is_up)),
        None => (String::new(), None),
    };

    let uptime_percent = if total_checks > 0 {
        successful_checks as f64 / total_checks as f64 * 100.0
    } else {
        0.0
    };

    Ok(TargetStats {
        target_name: target_name.to_string(),
        url,
        total_checks,
        successful_checks,
        uptime_percent,
        avg_response_time_ms: avg_us.map(|us| (us / 1000.0).round() as i64).unwrap_or(0),
        last_check: last_check.as_deref().and_then(parse_db_time),
        last_status: if total_checks > 0 {
            last_up.map(|up| if up { "UP" } else { "DOWN" }.to_string())
        } else {
            None
        },
    })
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
