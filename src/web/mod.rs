//! Web server module.

mod config_api;
mod handlers;

pub use config_api::*;
pub use handlers::*;

use crate::db::ResultSink;

use axum::{
    routing::{get, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub sink: Arc<dyn ResultSink>,
    pub editor: Arc<ConfigEditor>,
}

/// Dashboard, stats API and website configuration API.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(sink: Arc<dyn ResultSink>, editor: Arc<ConfigEditor>) -> Self {
        Self {
            state: AppState { sink, editor },
        }
    }

    /// Bind the listening socket on all interfaces.
    pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
        TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Dashboard
            .route("/", get(handlers::handle_dashboard))
            // API endpoints
            .route("/api/stats", get(handlers::handle_get_stats))
            .route("/api/logs", get(handlers::handle_get_logs))
            .route(
                "/api/config/websites",
                get(config_api::handle_get_websites).post(config_api::handle_create_website),
            )
            .route(
                "/api/config/websites/{id}",
                put(config_api::handle_update_website).delete(config_api::handle_delete_website),
            )
            .route("/api/config/settings", get(config_api::handle_get_settings))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until `cancel` fires.
    pub async fn serve(
        &self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!("Web server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.routes())
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }
}
