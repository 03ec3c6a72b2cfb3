//! Commit timestamp allocation
//!
//! Commit timestamps are logical microseconds: anchored to the wall clock
//! but guaranteed unique and strictly increasing across the process, and
//! always strictly greater than the branch head they are allocated against.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use termstore_core::types::Timestamp;

/// Monotonic commit-timestamp allocator
#[derive(Debug)]
pub struct CommitClock {
    last: AtomicU64,
}

impl CommitClock {
    /// Clock seeded from the wall clock
    pub fn new() -> Self {
        CommitClock {
            last: AtomicU64::new(Self::now_micros()),
        }
    }

    /// Current wall-clock time in microseconds since the epoch
    pub fn now_micros() -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }

    /// Last timestamp handed out
    pub fn last(&self) -> Timestamp {
        self.last.load(Ordering::SeqCst)
    }

    /// Allocate a timestamp strictly greater than both `head` and every
    /// timestamp previously handed out by this clock
    pub fn next_after(&self, head: Timestamp) -> Timestamp {
        loop {
            let last = self.last.load(Ordering::SeqCst);
            let candidate = last.max(head).max(Self::now_micros()) + 1;
            if self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return candidate;
            }
        }
    }
}

impl Default for CommitClock {
    fn default() -> Self {
        CommitClock::new()
    }
}
