//! Wall-clock abstraction and cache bucket keys.
//!
//! All time inside the engine is a timezone-naive [`NaiveDateTime`] on the
//! host's local calendar. Zone handling happens at the edges.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Source of "now". Swapped for [`ManualClock`] in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Thread-safe handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// Host local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn set(&self, instant: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Truncation granularity for cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Granularity {
    Hour,
    Day,
}

/// An instant truncated to a [`Granularity`].
///
/// Ordering is by granularity first, then by start instant, so the
/// smallest key of a granularity is also its oldest bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    granularity: Granularity,
    start: NaiveDateTime,
}

impl BucketKey {
    pub fn new(granularity: Granularity, instant: NaiveDateTime) -> Self {
        let start = match granularity {
            Granularity::Hour => instant
                .date()
                .and_time(NaiveTime::MIN)
                + Duration::hours(i64::from(instant.hour())),
            Granularity::Day => instant.date().and_time(NaiveTime::MIN),
        };
        Self { granularity, start }
    }

    pub fn hour(instant: NaiveDateTime) -> Self {
        Self::new(Granularity::Hour, instant)
    }

    pub fn day(instant: NaiveDateTime) -> Self {
        Self::new(Granularity::Day, instant)
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// First instant of the bucket. This is the instant handed to the provider.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.granularity {
            Granularity::Hour => write!(f, "{}", self.start.format("%Y-%m-%dT%H")),
            Granularity::Day => write!(f, "{}", self.start.format("%Y-%m-%d")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, 41)
            .unwrap()
    }

    #[test]
    fn hour_bucket_truncates_minutes_and_seconds() {
        let key = BucketKey::hour(at(14, 52));
        assert_eq!(key.start(), at(14, 0) - Duration::seconds(41));
        assert_eq!(key, BucketKey::hour(at(14, 3)));
        assert_ne!(key, BucketKey::hour(at(15, 3)));
        assert_eq!(key.to_string(), "2025-03-09T14");
    }

    #[test]
    fn day_bucket_ignores_time_of_day() {
        assert_eq!(BucketKey::day(at(0, 1)), BucketKey::day(at(23, 59)));
        assert_eq!(BucketKey::day(at(9, 0)).to_string(), "2025-03-09");
    }

    #[test]
    fn same_instant_different_granularity_differs() {
        assert_ne!(BucketKey::hour(at(0, 0)), BucketKey::day(at(0, 0)));
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(at(8, 0));
        clock.advance(Duration::seconds(61));
        assert_eq!(clock.now(), at(8, 0) + Duration::seconds(61));
        clock.set(at(1, 0));
        assert_eq!(clock.now(), at(1, 0));
    }
}
