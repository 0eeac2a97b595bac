//! Configuration loading from disk and the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{LogFormat, ManagerConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error("invalid value `{value}` for environment variable {var}")]
    Env { var: &'static str, value: String },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from the process environment.
///
/// `CONFIG_FILE` optionally names a TOML file used as the base; the remaining
/// variables override individual settings.
pub fn load_from_env() -> Result<ManagerConfig, ConfigError> {
    load_with(|var| std::env::var(var).ok())
}

/// Same as [`load_from_env`] with an injectable variable lookup.
pub fn load_with<F>(lookup: F) -> Result<ManagerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup("CONFIG_FILE") {
        Some(path) => read_toml(Path::new(&path))?,
        None => ManagerConfig::default(),
    };

    apply_env(&mut config, &lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_toml(path: &Path) -> Result<ManagerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env<F>(config: &mut ManagerConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("DYNAMIC_CONFIG_PATH") {
        config.paths.dynamic_dir = PathBuf::from(dir);
    }
    if let Some(dir) = lookup("METADATA_PATH") {
        config.paths.metadata_dir = PathBuf::from(dir);
    }
    if let Some(dir) = lookup("BACKUP_PATH") {
        config.paths.backups_dir = PathBuf::from(dir);
    }

    let host = lookup("HOST");
    let port = lookup("PORT");
    if host.is_some() || port.is_some() {
        let (default_host, default_port) = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(h, p)| (h.to_string(), p.to_string()))
            .unwrap_or_else(|| ("0.0.0.0".to_string(), "3001".to_string()));
        let port = match port {
            Some(p) => parsed::<u16>("PORT", &p)?.to_string(),
            None => default_port,
        };
        config.listener.bind_address = format!("{}:{}", host.unwrap_or(default_host), port);
    }

    if let Some(value) = lookup("MAX_BACKUPS") {
        config.backups.max_backups = parsed("MAX_BACKUPS", &value)?;
    }
    if let Some(value) = lookup("WATCH_DEBOUNCE_MS") {
        config.watcher.debounce_ms = parsed("WATCH_DEBOUNCE_MS", &value)?;
    }
    if let Some(value) = lookup("WATCH_ENABLED") {
        config.watcher.enabled = parsed_bool("WATCH_ENABLED", &value)?;
    }
    if let Some(value) = lookup("LOG_LEVEL") {
        config.observability.log_level = value.to_ascii_lowercase();
    }
    if let Some(value) = lookup("LOG_FORMAT") {
        config.observability.log_format = match value.to_ascii_lowercase().as_str() {
            "pretty" | "text" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => return Err(ConfigError::Env { var: "LOG_FORMAT", value }),
        };
    }
    if let Some(value) = lookup("METRICS_ENABLED") {
        config.observability.metrics_enabled = parsed_bool("METRICS_ENABLED", &value)?;
    }
    if let Some(value) = lookup("METRICS_ADDRESS") {
        config.observability.metrics_address = value;
    }

    Ok(())
}

fn parsed<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}

fn parsed_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var,
            value: value.to_string(),
        }),
    }
}
