// libs/sacrament-cell/src/services/clock.rs
use std::sync::RwLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use tracing::warn;

/// Supplies "now" and "today" to every time-sensitive decision.
pub trait ClockSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day of `now` in the parish's local offset.
    fn today(&self) -> NaiveDate;
}

fn offset_from_minutes(offset_minutes: i32) -> FixedOffset {
    offset_minutes.checked_mul(60).and_then(FixedOffset::east_opt).unwrap_or_else(|| {
        warn!("UTC offset of {} minutes is out of range, falling back to UTC", offset_minutes);
        Utc.fix()
    })
}

pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset_minutes: i32) -> Self {
        Self {
            offset: offset_from_minutes(offset_minutes),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// A clock that only moves when told to.
pub struct FixedClock {
    instant: RwLock<DateTime<Utc>>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self::with_offset(instant, 0)
    }

    pub fn with_offset(instant: DateTime<Utc>, offset_minutes: i32) -> Self {
        Self {
            instant: RwLock::new(instant),
            offset: offset_from_minutes(offset_minutes),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.instant.write().unwrap_or_else(|e| e.into_inner());
        *guard = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.instant.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl ClockSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.read().unwrap_or_else(|e| e.into_inner())
    }

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.offset).date_naive()
    }
}
