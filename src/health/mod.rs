//! Health reporting subsystem.
//!
//! # Probes
//! ```text
//! /health (liveness):  dynamic directory exists and can be listed → 200, else 503
//! /ready  (readiness): first reconciliation finished             → 200, else 503
//! ```
//!
//! # Design Decisions
//! - Readiness flips once and never flips back
//! - Liveness is re-checked on every request (the directory may be a mount)

pub mod state;

pub use state::Readiness;
