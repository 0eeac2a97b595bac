//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (backups >= 1, debounce > 0, addresses parse)
//! - Detect overlapping directories
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ManagerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ManagerConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if config.backups.max_backups == 0 {
        errors.push(ValidationError::new("backups.max_backups", "must be at least 1"));
    }

    if config.watcher.debounce_ms == 0 {
        errors.push(ValidationError::new("watcher.debounce_ms", "must be greater than 0"));
    }

    let paths = &config.paths;
    if paths.dynamic_dir == paths.metadata_dir
        || paths.dynamic_dir == paths.backups_dir
        || paths.metadata_dir == paths.backups_dir
    {
        errors.push(ValidationError::new(
            "paths",
            "dynamic, metadata and backup directories must be distinct",
        ));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("must be one of {}", LOG_LEVELS.join(", ")),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ManagerConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config = ManagerConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.backups.max_backups = 0;
        config.watcher.debounce_ms = 0;
        config.paths.backups_dir = config.paths.metadata_dir.clone();
        config.observability.log_level = "loud".into();

        let fields: Vec<&str> = validate_config(&config)
            .unwrap_err()
            .iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "backups.max_backups",
                "watcher.debounce_ms",
                "paths",
                "observability.log_level",
            ]
        );
    }
}
