//! Traefik dynamic configuration manager.
//!
//! Manages HTTP routing rules for a Traefik file provider: every rule is one
//! YAML file in the dynamic directory, mirrored in a JSON metadata index that
//! gives each rule a stable id.
//!
//! # Architecture Overview
//!
//! ```text
//!     API request                               external edit
//!     ──────────┐                               ──────────┐
//!               ▼                                         ▼
//!         ┌──────────┐                             ┌────────────┐
//!         │   http   │                             │   watch    │
//!         │ handlers │                             │  debounce  │
//!         └────┬─────┘                             └─────┬──────┘
//!              │                                         │
//!              ▼                                         ▼
//!         ┌─────────────────────────────────────────────────────┐
//!         │            service (single-writer lock)             │
//!         │   create / update / delete        sync_from_disk    │
//!         └────┬──────────────────┬───────────────────┬─────────┘
//!              │                  │                   │
//!              ▼                  ▼                   ▼
//!         ┌─────────┐       ┌───────────┐       ┌───────────┐
//!         │  rules  │       │  storage  │       │ discovery │
//!         │ codec + │       │ index,    │       │ scan dir, │
//!         │validator│       │ backups   │       │ parse     │
//!         └─────────┘       └───────────┘       └───────────┘
//! ```

// Core subsystems
pub mod config;
pub mod discovery;
pub mod rules;
pub mod service;
pub mod storage;
pub mod watch;

// Serving
pub mod health;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ManagerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use service::RulesService;
