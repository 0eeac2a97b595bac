//! Startup orchestration.
//!
//! # Responsibilities
//! - Create the dynamic, metadata and backup directories
//! - Run the initial reconciliation and flip readiness
//! - Start the file watcher when enabled
//! - Bind the listener and serve until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast: directory, watcher and bind errors are fatal
//! - A failed initial reconciliation is logged, not fatal; the service still
//!   becomes ready and serves whatever index is on disk
//! - Requests are accepted only once the index is reconciled

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ManagerConfig;
use crate::health::Readiness;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::service::RulesService;
use crate::watch::FileWatcher;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to prepare directory {}: {source}", .path.display())]
    Directories { path: PathBuf, source: io::Error },

    #[error("failed to watch {}: {source}", .path.display())]
    Watcher { path: PathBuf, source: notify::Error },

    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Run the manager until SIGINT/SIGTERM.
pub async fn run(config: ManagerConfig) -> Result<(), StartupError> {
    let shutdown = Arc::new(Shutdown::new());
    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let trigger = shutdown.clone();
    tokio::spawn(async move { signals::forward_to(&trigger).await });

    serve(config, listener, shutdown).await
}

/// Bring up every subsystem on an already bound listener and serve until
/// `shutdown` is triggered.
pub async fn serve(
    config: ManagerConfig,
    listener: TcpListener,
    shutdown: Arc<Shutdown>,
) -> Result<(), StartupError> {
    let rules = Arc::new(RulesService::from_config(&config));
    rules
        .init()
        .await
        .map_err(|source| StartupError::Directories {
            path: config.paths.dynamic_dir.clone(),
            source,
        })?;

    let readiness = Arc::new(Readiness::new());
    match rules.sync_from_disk().await {
        Ok(report) => tracing::info!(
            rules = report.count,
            retained = report.retained,
            failures = report.failures,
            "Initial reconciliation complete"
        ),
        Err(e) => tracing::error!(error = %e, "Initial reconciliation failed"),
    }
    readiness.mark_ready();

    let watcher = if config.watcher.enabled {
        let delay = Duration::from_millis(config.watcher.debounce_ms);
        let watcher = FileWatcher::start(rules.dynamic_dir(), delay, rules.clone()).map_err(
            |source| StartupError::Watcher {
                path: config.paths.dynamic_dir.clone(),
                source,
            },
        )?;
        Some(watcher)
    } else {
        tracing::info!("Rule watcher disabled");
        None
    };

    let state = AppState {
        rules,
        readiness,
    };
    let server = HttpServer::new(state, &config.security);
    let result = server.run(listener, shutdown.wait()).await;

    if let Some(watcher) = watcher {
        watcher.stop().await;
    }

    result.map_err(StartupError::Serve)?;
    tracing::info!("Shutdown complete");
    Ok(())
}
