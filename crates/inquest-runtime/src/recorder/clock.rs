//! Time sources for recorder timestamps.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Wall-clock source.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Clock frozen at the Unix epoch.
    pub fn at_epoch() -> Self {
        Self::new(DateTime::UNIX_EPOCH)
    }

    /// Move forward by `millis`.
    pub fn advance_ms(&self, millis: i64) {
        let mut now = self.now.lock();
        *now += TimeDelta::milliseconds(millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
