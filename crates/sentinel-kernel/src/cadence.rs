//! [`Cadence`] – drift-free periodic wake-ups.
//!
//! Each wake-up is scheduled at `previous_deadline + period`, never at
//! `now + period`, so time spent doing work inside a cycle does not
//! accumulate into drift.  If a cycle overruns a deadline, the next tick
//! returns immediately and the schedule catches up.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

#[derive(Debug)]
pub struct Cadence {
    period: Duration,
    next: Instant,
    cycles: u64,
}

impl Cadence {
    /// First wake-up is one `period` after now.
    pub fn new(period: Duration) -> Self {
        Self::starting_at(Instant::now(), period)
    }

    /// First wake-up is one `period` after `start`.
    pub fn starting_at(start: Instant, period: Duration) -> Self {
        Self {
            period,
            next: start + period,
            cycles: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of completed ticks.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Sleep until the next absolute deadline and return it.
    pub async fn tick(&mut self) -> Instant {
        let deadline = self.next;
        sleep_until(deadline).await;
        self.next = deadline + self.period;
        self.cycles += 1;
        deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadlines_do_not_drift_with_work() {
        let start = Instant::now();
        let mut cadence = Cadence::starting_at(start, Duration::from_millis(100));

        for n in 1..=5u32 {
            let deadline = cadence.tick().await;
            assert_eq!(deadline, start + Duration::from_millis(100) * n);
            // Simulated work inside the cycle.
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        assert_eq!(cadence.cycles(), 5);
        assert_eq!(Instant::now(), start + Duration::from_millis(530));
    }

    #[tokio::test(start_paused = true)]
    async fn overrun_catches_up() {
        let start = Instant::now();
        let mut cadence = Cadence::starting_at(start, Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(250)).await;

        // Two deadlines already passed: both return without sleeping.
        assert_eq!(cadence.tick().await, start + Duration::from_millis(100));
        assert_eq!(cadence.tick().await, start + Duration::from_millis(200));
        assert_eq!(Instant::now(), start + Duration::from_millis(250));
        assert_eq!(cadence.tick().await, start + Duration::from_millis(300));
    }
}
