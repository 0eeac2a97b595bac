//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file (CONFIG_FILE)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (paths, HOST/PORT, backups, watcher, logging)
//!     → validation.rs (semantic checks)
//!     → ManagerConfig (validated, immutable, read once at start)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow an empty environment
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_from_env, load_with, ConfigError};
pub use schema::{
    BackupConfig, ListenerConfig, LogFormat, ManagerConfig, ObservabilityConfig, PathsConfig,
    SecurityConfig, WatcherConfig,
};
