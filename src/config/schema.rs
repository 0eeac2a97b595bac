//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the manager.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the rule manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ManagerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Directories the manager reads and writes.
    pub paths: PathsConfig,

    /// Backup retention.
    pub backups: BackupConfig,

    /// File watcher settings.
    pub watcher: WatcherConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory Traefik's file provider reads (`*.yaml`/`*.yml`, flat).
    pub dynamic_dir: PathBuf,

    /// Directory holding `index.json`.
    pub metadata_dir: PathBuf,

    /// Directory holding backup snapshots.
    pub backups_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dynamic_dir: PathBuf::from("/etc/traefik/dynamic"),
            metadata_dir: PathBuf::from("./data/metadata"),
            backups_dir: PathBuf::from("./data/backups"),
        }
    }
}

/// Backup retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Snapshots kept per rule name.
    pub max_backups: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self { max_backups: 10 }
    }
}

/// File watcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Watch the dynamic directory for external edits.
    pub enabled: bool,

    /// Quiet period before a burst of changes triggers reconciliation, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 2000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9091".to_string(),
        }
    }
}

/// Request hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}
