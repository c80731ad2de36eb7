//! Vigil - Website Uptime Monitor
//!
//! Probes HTTP endpoints on a fixed interval, records every outcome, and
//! notifies when a site goes down or comes back.

mod alert;
mod config;
mod db;
mod monitor;
mod pool;
mod probe;
mod scheduler;
mod web;

use alert::{Dispatcher, Notifier, TelegramNotifier};
use clap::Parser;
use config::Config;
use db::{ResultSink, Store};
use monitor::Monitor;
use pool::{PoolConfig, WorkerPool};
use probe::HttpProbe;
use scheduler::{RetentionManager, Scheduler, SummaryReporter};
use web::{ConfigEditor, Server};

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "vigil", version, about = "Website uptime monitor")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "VIGIL_CONFIG", default_value = "configs/config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("vigil=info".parse()?))
        .init();

    let args = Args::parse();

    // Load configuration
    let cfg = Config::load(&args.config)?;
    cfg.validate()?;
    tracing::info!("Loaded {} websites from {}", cfg.websites.len(), args.config);
    tracing::info!("Using database at {}", cfg.storage.path);

    // Initialize database
    if let Some(dir) = Path::new(&cfg.storage.path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let store = Arc::new(Store::new(&cfg.storage.path)?);
    let sink: Arc<dyn ResultSink> = store;
    tracing::info!("Database initialized successfully");

    // Notifications
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if cfg.notifications.telegram.enabled {
        let telegram = &cfg.notifications.telegram;
        notifiers.push(Arc::new(TelegramNotifier::new(&telegram.bot_token, &telegram.chat_id)?));
    }
    let dispatcher = Arc::new(Dispatcher::new(notifiers));
    if dispatcher.enabled_count() == 0 {
        tracing::warn!("No notification backends enabled, alerts will only be logged");
    }

    // Monitoring pipeline
    let probe = Arc::new(HttpProbe::new()?);
    let pool = Arc::new(WorkerPool::new(
        PoolConfig::new(cfg.monitoring.workers, cfg.timeout()),
        probe,
    ));
    let scheduler = Arc::new(Scheduler::new(pool.clone(), cfg.targets(), cfg.interval()));

    // Web listener, bound before the pipeline starts
    let web = if cfg.web.enabled {
        let listener = Server::bind(cfg.web.port).await?;
        let editor = ConfigEditor::new(&args.config, Config::read(&args.config)?, scheduler.clone());
        Some((listener, Arc::new(editor)))
    } else {
        None
    };

    let mut monitor = Monitor::new(pool, scheduler.clone(), sink.clone(), dispatcher.clone());
    monitor.start().await?;

    // Background maintenance
    let retention = RetentionManager::new(sink.clone(), cfg.storage.retention_days);
    retention.start().await;

    let summary = match cfg.summary_interval() {
        Some(period) => {
            let reporter = SummaryReporter::new(sink.clone(), dispatcher, period);
            reporter.start().await;
            Some(reporter)
        }
        None => None,
    };

    // Web server
    let web_cancel = CancellationToken::new();
    let web_task = match web {
        Some((listener, editor)) => {
            let server = Server::new(sink, editor);
            let cancel = web_cancel.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = server.serve(listener, cancel).await {
                    tracing::error!("Web server failed: {}", e);
                }
            }))
        }
        None => None,
    };

    shutdown_signal().await;
    tracing::info!("Shutting down...");

    web_cancel.cancel();
    if let Some(task) = web_task {
        if let Err(e) = task.await {
            tracing::error!("Web server exited abnormally: {}", e);
        }
    }
    if let Some(reporter) = summary {
        reporter.stop().await;
    }
    retention.stop().await;

    match monitor.shutdown().await {
        Some(tracker) if !tracker.is_empty() => {
            tracing::info!("Final state recorded for {} websites", tracker.len());
        }
        _ => tracing::info!("No probe outcomes were recorded"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
