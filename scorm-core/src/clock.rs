//! Wall-clock abstraction
//!
//! Ledger timestamps and the compactor's time budget both read the time
//! through [`Clock`], so tests can drive them deterministically with
//! [`ManualClock`] instead of waiting on real time.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// With a non-zero tick, every call to [`Clock::now`] returns the current
/// instant and then advances by the tick.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
    tick_micros: i64,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
            tick_micros: 0,
        }
    }

    /// Create a clock frozen at the Unix epoch
    pub fn at_epoch() -> Self {
        Self::new(DateTime::UNIX_EPOCH)
    }

    /// Advance automatically by `tick` after each reading
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick_micros = tick.num_microseconds().unwrap_or(i64::MAX);
        self
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let delta = by.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.micros.fetch_add(self.tick_micros, Ordering::SeqCst);
        DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::UNIX_EPOCH)
    }
}
