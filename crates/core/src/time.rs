//! Time sources
//!
//! The ledger never reads the wall clock directly. Every timing check goes
//! through an injected [`Clock`], which must be monotonically non-decreasing.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::Timestamp;

/// One hour in seconds
pub const HOUR: u64 = 60 * 60;
/// One day in seconds
pub const DAY: u64 = 24 * HOUR;

/// A source of the current time in seconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // Pre-epoch clocks read as zero
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move the clock forward by `secs`. Returns `None`, leaving the clock
    /// untouched, if the reading would overflow.
    pub fn advance(&self, secs: u64) -> Option<Timestamp> {
        self.now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| now.checked_add(secs))
            .ok()
            .map(|previous| previous + secs)
    }

    /// Set the clock to `at`. Times earlier than the current reading are ignored.
    pub fn set(&self, at: Timestamp) -> Timestamp {
        self.now.fetch_max(at, Ordering::SeqCst).max(at)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
