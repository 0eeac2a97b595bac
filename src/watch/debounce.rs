//! Debounce state machine.
//!
//! # States
//! ```text
//! Idle ──trigger──► Pending(deadline) ──trigger──► Pending(now + delay)
//!                        │
//!                        └──fire (now >= deadline)──► Idle
//! any ──cancel──► Cancelled (terminal; triggers are ignored)
//! ```

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending(Instant),
    Cancelled,
}

/// Collapses bursts of events into one action after a quiet period.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Record an event at `now`, pushing the deadline out. Returns `false` once cancelled.
    pub fn trigger(&mut self, now: Instant) -> bool {
        if self.state == DebounceState::Cancelled {
            return false;
        }
        self.state = DebounceState::Pending(now + self.delay);
        true
    }

    /// When the pending action is due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Pending(deadline) => Some(deadline),
            _ => None,
        }
    }

    /// Consume the pending action if its deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Pending(deadline) if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.state = DebounceState::Cancelled;
    }
}
