//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through HTTP spans
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
