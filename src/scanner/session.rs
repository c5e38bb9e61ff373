// SPDX-License-Identifier: GPL-3.0-only

//! Scanner session bookkeeping: status, attempt ids and noise sampling

use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle status of a scanner widget
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScannerStatus {
    #[default]
    Idle,
    Initializing,
    Running,
    /// Unrecoverable error, carrying the user-facing message
    Failed(String),
}

impl ScannerStatus {
    pub fn is_initializing(&self) -> bool {
        matches!(self, ScannerStatus::Initializing)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ScannerStatus::Running)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ScannerStatus::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Identifier of one initialization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic attempt counter
///
/// Starting an attempt or invalidating bumps the counter, so any attempt
/// holding an older id observes that it is stale.
#[derive(Debug, Default)]
pub struct AttemptCounter(AtomicU64);

impl AttemptCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> AttemptId {
        AttemptId(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Make every outstanding attempt stale
    pub fn invalidate(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, id: AttemptId) -> bool {
        self.0.load(Ordering::SeqCst) == id.0
    }
}

/// Lets through the first event and then one in every `every`
#[derive(Debug, Clone)]
pub struct NoiseSampler {
    every: u64,
    seen: u64,
}

impl NoiseSampler {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }

    /// Count an event, returning the running total when it should be logged
    pub fn record(&mut self) -> Option<u64> {
        self.seen += 1;
        if self.seen == 1 || self.seen % self.every == 0 {
            Some(self.seen)
        } else {
            None
        }
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }
}
