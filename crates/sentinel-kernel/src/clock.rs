//! Monotonic tick clock: milliseconds since the system was built.
//!
//! Backed by [`tokio::time::Instant`] so paused-time tests advance it
//! deterministically.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Start a clock whose tick 0 is now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Milliseconds elapsed since [`start`][Self::start].
    pub fn now_ms(&self) -> u64 {
        self.ms_at(Instant::now())
    }

    /// Tick of an arbitrary instant; instants before the epoch map to 0.
    pub fn ms_at(&self, at: Instant) -> u64 {
        u64::try_from(at.saturating_duration_since(self.epoch).as_millis()).unwrap_or(u64::MAX)
    }

    /// Instant corresponding to tick `ms`.
    pub fn instant_at(&self, ms: u64) -> Instant {
        self.epoch + Duration::from_millis(ms)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_follow_virtual_time() {
        let clock = MonotonicClock::start();
        assert_eq!(clock.now_ms(), 0);
        tokio::time::sleep(Duration::from_millis(1234)).await;
        assert_eq!(clock.now_ms(), 1234);
        assert_eq!(clock.ms_at(clock.instant_at(77)), 77);
    }
}
