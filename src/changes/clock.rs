//! Monotonic wall clock for change records
//!
//! Records carry wall-clock milliseconds, but the system clock can step
//! backwards (NTP adjustments, manual changes). The clock remembers the
//! largest value it handed out and never returns anything smaller, so
//! history timestamps are non-decreasing in insertion order.
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Non-decreasing millisecond clock
#[derive(Debug)]
pub struct MonotonicClock {
    last: AtomicU64,
}

impl MonotonicClock {
    /// Create a new clock with no history
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Current wall-clock time in milliseconds, never below a previous reading
    pub fn now_millis(&self) -> u64 {
        let wall = Utc::now().timestamp_millis().max(0) as u64;
        self.observe(wall)
    }

    /// Feed an externally captured reading; returns the clamped value
    pub fn observe(&self, millis: u64) -> u64 {
        let previous = self.last.fetch_max(millis, Ordering::SeqCst);
        previous.max(millis)
    }

    /// Last value handed out (0 before the first reading)
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert record milliseconds back into a UTC timestamp
pub fn to_datetime(millis: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(i64::try_from(millis).ok()?)
}
