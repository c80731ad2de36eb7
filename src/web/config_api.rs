//! Website configuration API.
//!
//! Edits are validated with the same rules as startup, written back to the
//! config file, and then handed to the scheduler for its next round.

use super::AppState;
use crate::config::{Config, ConfigError, WebsiteConfig};
use crate::scheduler::Scheduler;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A configured website with its position in the config file.
#[derive(Debug, Clone, Serialize)]
pub struct WebsiteEntry {
    pub id: usize,
    #[serde(flatten)]
    pub website: WebsiteConfig,
}

/// Owns the on-disk configuration and applies edits to it.
pub struct ConfigEditor {
    path: PathBuf,
    config: Mutex<Config>,
    scheduler: Arc<Scheduler>,
}

impl ConfigEditor {
    /// `config` is the file as written, without environment overrides.
    pub fn new(path: impl Into<PathBuf>, config: Config, scheduler: Arc<Scheduler>) -> Self {
        Self {
            path: path.into(),
            config: Mutex::new(config),
            scheduler,
        }
    }

    pub async fn websites(&self) -> Vec<WebsiteEntry> {
        let config = self.config.lock().await;
        config
            .websites
            .iter()
            .enumerate()
            .map(|(id, website)| WebsiteEntry {
                id,
                website: website.clone(),
            })
            .collect()
    }

    pub async fn add(&self, mut website: WebsiteConfig) -> Result<WebsiteEntry, ConfigError> {
        let mut config = self.config.lock().await;
        let mut candidate = config.clone();

        website.apply_defaults(candidate.monitoring.timeout);
        candidate.websites.push(website.clone());
        let id = candidate.websites.len() - 1;

        self.commit(&mut config, candidate).await?;
        Ok(WebsiteEntry { id, website })
    }

    /// Returns `None` when there is no website at `id`.
    pub async fn update(
        &self,
        id: usize,
        mut website: WebsiteConfig,
    ) -> Result<Option<WebsiteEntry>, ConfigError> {
        let mut config = self.config.lock().await;
        if id >= config.websites.len() {
            return Ok(None);
        }

        let mut candidate = config.clone();
        website.apply_defaults(candidate.monitoring.timeout);
        candidate.websites[id] = website.clone();

        self.commit(&mut config, candidate).await?;
        Ok(Some(WebsiteEntry { id, website }))
    }

    /// Returns `false` when there is no website at `id`.
    pub async fn remove(&self, id: usize) -> Result<bool, ConfigError> {
        let mut config = self.config.lock().await;
        if id >= config.websites.len() {
            return Ok(false);
        }

        let mut candidate = config.clone();
        let removed = candidate.websites.remove(id);

        self.commit(&mut config, candidate).await?;
        tracing::info!("ConfigEditor: Removed website {}", removed.name);
        Ok(true)
    }

    pub async fn settings(&self) -> serde_json::Value {
        let config = self.config.lock().await;
        json!({
            "monitoring": {
                "interval": config.monitoring.interval,
                "timeout": config.monitoring.timeout,
                "workers": config.monitoring.workers,
                "summary_interval": config.monitoring.summary_interval,
            },
            "notifications": {
                "telegram_enabled": config.notifications.telegram.enabled,
            },
        })
    }

    async fn commit(&self, current: &mut Config, candidate: Config) -> Result<(), ConfigError> {
        candidate.validate()?;
        candidate.save(&self.path)?;

        self.scheduler.set_targets(candidate.targets()).await;
        *current = candidate;
        Ok(())
    }
}

fn error_response(e: ConfigError) -> Response {
    match e {
        ConfigError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
        other => {
            tracing::error!("ConfigEditor: Failed to apply change: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save configuration").into_response()
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn handle_get_websites(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.editor.websites().await)
}

pub async fn handle_create_website(
    State(state): State<AppState>,
    Json(website): Json<WebsiteConfig>,
) -> Response {
    match state.editor.add(website).await {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_update_website(
    State(state): State<AppState>,
    Path(id): Path<usize>,
    Json(website): Json<WebsiteConfig>,
) -> Response {
    match state.editor.update(id, website).await {
        Ok(Some(entry)) => Json(entry).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Website not found").into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_delete_website(
    State(state): State<AppState>,
    Path(id): Path<usize>,
) -> Response {
    match state.editor.remove(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Website not found").into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_get_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.editor.settings().await)
}
