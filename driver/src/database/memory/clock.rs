use std::sync::{Arc, RwLock};

use kernel::interface::config::Clock;
use time::{Duration, OffsetDateTime};

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<RwLock<OffsetDateTime>>);

impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self(Arc::new(RwLock::new(now)))
    }

    pub fn set(&self, now: OffsetDateTime) {
        let mut guard = self.0.write().unwrap_or_else(|poison| poison.into_inner());
        *guard = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.0.write().unwrap_or_else(|poison| poison.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.0.read().unwrap_or_else(|poison| poison.into_inner())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn only_moves_on_demand() {
        let clock = ManualClock::new(datetime!(2024-01-01 09:00 UTC));
        assert_eq!(clock.now(), datetime!(2024-01-01 09:00 UTC));
        clock.advance(Duration::days(2));
        assert_eq!(clock.now(), datetime!(2024-01-03 09:00 UTC));
        clock.set(datetime!(2023-12-31 00:00 UTC));
        assert_eq!(clock.now(), datetime!(2023-12-31 00:00 UTC));
    }
}
