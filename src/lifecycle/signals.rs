//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) or, on Unix, SIGTERM
//! - Translate the first one into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that fails to install is logged and treated as never firing

use crate::lifecycle::shutdown::Shutdown;

/// Resolve when the process is asked to terminate.
pub async fn termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "SIGINT", "Shutdown signal received"),
        _ = terminate => tracing::info!(signal = "SIGTERM", "Shutdown signal received"),
    }
}

/// Trigger `shutdown` on the first termination signal.
pub async fn forward_to(shutdown: &Shutdown) {
    termination().await;
    shutdown.trigger();
}
