//! Injectable time source.
//!
//! Local store expiry and rate-limit window ids read time through [`Clock`]
//! so tests can move time forward without sleeping.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

/// Source of the current wall-clock time in whole seconds.
pub trait Clock: Send + Sync {
    /// Seconds elapsed since the UNIX epoch.
    fn now_secs(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_secs(&self) -> u64 {
        // A clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_secs: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `start_secs`.
    pub fn new(start_secs: u64) -> Self {
        Self {
            now_secs: AtomicU64::new(start_secs),
        }
    }

    /// Jump to `secs`.
    pub fn set(&self, secs: u64) {
        self.now_secs.store(secs, Ordering::SeqCst);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now_secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now_secs.load(Ordering::SeqCst)
    }
}
