//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Pick pretty or JSON output
//! - Configure log level from config, overridable with RUST_LOG
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - RUST_LOG wins over the configured level when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Default filter directives for a log level.
pub fn default_directives(level: &str) -> String {
    format!("traefik_config_manager={level},tower_http={level}", level = level)
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives(&config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}
