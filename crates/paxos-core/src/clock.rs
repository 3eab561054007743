//! # clock
//!
//! why: order proposals with a lamport-style round number
//! relations: ticked and advanced by proposer.rs, read by learner.rs for audit events
//! what: LogicalClock

use std::sync::atomic::{AtomicU64, Ordering};

/// Node-local logical clock. Never decreases.
#[derive(Debug, Default)]
pub struct LogicalClock {
    value: AtomicU64,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new round: increment and return the new value.
    pub fn tick(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Advance to `observed` if it is higher than the current value.
    pub fn observe(&self, observed: u64) {
        self.value.fetch_max(observed, Ordering::SeqCst);
    }

    pub fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}
