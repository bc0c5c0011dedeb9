use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

/// Source of "now". Validation and ranking only ever read time through this trait.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and demos.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|err| err.into_inner());
        *guard = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|err| err.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|err| err.into_inner())
    }
}

/// Half-open UTC interval `[start, end)` covering one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The local day that contains `now` for an agent at `offset`.
    pub fn containing(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local_date = now.with_timezone(&offset).date_naive();
        let midnight = local_date.and_time(NaiveTime::MIN);
        let start = Utc.from_utc_datetime(
            &(midnight - Duration::seconds(i64::from(offset.local_minus_utc()))),
        );

        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}
