//! Time sources for the engine.
//!
//! Every service reads "now" through a [`Clock`] so a reminder sweep can
//! take one snapshot and tests can move time forward deterministically.

use std::fmt;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use parking_lot::RwLock;

/// A source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Jumps to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Returns 23:59:59.999 of `now`'s calendar day in `tz`, as UTC.
///
/// Falls back to the naive end of day read as UTC if that local time does
/// not exist in `tz`.
#[must_use]
pub fn end_of_day_in<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local = now.with_timezone(tz);
    let Some(end) = local.date_naive().and_hms_milli_opt(23, 59, 59, 999) else {
        return now;
    };
    tz.from_local_datetime(&end)
        .latest()
        .map_or_else(|| end.and_utc(), |t| t.with_timezone(&Utc))
}

/// Returns the end of `now`'s calendar day in the process's local time zone.
#[must_use]
pub fn end_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    end_of_day_in(now, &Local)
}
