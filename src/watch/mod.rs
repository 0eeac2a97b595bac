//! File watching subsystem.
//!
//! # Data Flow
//! ```text
//! notify event (create/modify/remove on *.yaml|*.yml, non-recursive)
//!     → watcher.rs (filter, forward over mpsc)
//!     → debounce.rs (re-arm deadline on every event)
//!     → deadline passes with no new events
//!     → one reconciliation (RulesService::sync_from_disk)
//! ```
//!
//! # Design Decisions
//! - A single task owns the debounce state; the notify thread only sends signals
//! - Reconciliation errors are logged and the loop keeps watching
//! - Stopping cancels a pending reconciliation instead of running it

pub mod debounce;
pub mod watcher;

pub use debounce::{DebounceState, Debouncer};
pub use watcher::{FileWatcher, Reconcile};
