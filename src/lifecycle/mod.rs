//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Bind listener → Prepare directories → Initial reconciliation
//!         → Mark ready → Start watcher → Serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain requests → Stop watcher → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: directories and index first, then listeners
//! - Ordered shutdown: stop accept, drain, cancel pending reconciliation

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, serve, StartupError};
