//! See [`ManualClock`].

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use waylink_runtime::Clock;

/// A [`Clock`] whose time only moves when the test advances it.
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Builds a clock starting at `start`.
    #[must_use]
    pub fn new(start: SystemTime) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
