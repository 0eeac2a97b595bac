//! Readiness state.
//!
//! # State Transitions
//! ```text
//! Starting → Ready: first reconciliation pass completed (success or logged failure)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether startup reconciliation has completed.
#[derive(Debug, Default)]
pub struct Readiness {
    ready: AtomicBool,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            tracing::info!("Service ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
