//! Watchdog keeper task.
//!
//! Every 500 ms: toggle the keep-alive line (unless the watchdog is being
//! starved) and sample the external watchdog's timed-out input.  A
//! timed-out watchdog only raises the reset-source flag; the arbitrator
//! picks it up on its own cycle.

use std::sync::Arc;

use sentinel_hal::{InputLine, OutputLine};
use sentinel_kernel::policy::WATCHDOG_KEEPER_PERIOD;
use sentinel_kernel::{Cadence, MonotonicClock, ResetSources, WatchdogState};
use sentinel_types::ResetSourceKind;
use tracing::{trace, warn};

pub struct WatchdogKeeper {
    wake: Arc<dyn OutputLine>,
    done: Arc<dyn InputLine>,
    state: Arc<WatchdogState>,
    sources: Arc<ResetSources>,
    clock: MonotonicClock,
}

impl WatchdogKeeper {
    pub fn new(
        wake: Arc<dyn OutputLine>,
        done: Arc<dyn InputLine>,
        state: Arc<WatchdogState>,
        sources: Arc<ResetSources>,
        clock: MonotonicClock,
    ) -> Self {
        Self {
            wake,
            done,
            state,
            sources,
            clock,
        }
    }

    pub fn cycle(&self, now_ms: u64) {
        if !self.state.is_starving() {
            match self.wake.toggle() {
                Ok(level) => {
                    self.state.record_ping(now_ms);
                    trace!(level, tick_ms = now_ms, "watchdog keep-alive");
                }
                Err(e) => warn!(error = %e, "watchdog keep-alive failed"),
            }
        }

        if self.done.is_high() && !self.sources.is_asserted(ResetSourceKind::Watchdog) {
            warn!(tick_ms = now_ms, "external watchdog timed out");
            self.sources.assert(ResetSourceKind::Watchdog);
        }
    }

    pub async fn run(self) {
        let mut cadence = Cadence::new(WATCHDOG_KEEPER_PERIOD);
        loop {
            let deadline = cadence.tick().await;
            self.cycle(self.clock.ms_at(deadline));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_hal::sim::{SimInputLine, SimOutputLine};

    struct Rig {
        keeper: WatchdogKeeper,
        wake: Arc<SimOutputLine>,
        done: Arc<SimInputLine>,
        state: Arc<WatchdogState>,
        sources: Arc<ResetSources>,
    }

    fn rig() -> Rig {
        let wake = SimOutputLine::new("wdog_wake");
        let done = SimInputLine::new("wdog_done");
        let state = Arc::new(WatchdogState::new());
        let sources = Arc::new(ResetSources::new());
        let keeper = WatchdogKeeper::new(
            wake.clone(),
            done.clone(),
            state.clone(),
            sources.clone(),
            MonotonicClock::start(),
        );
        Rig {
            keeper,
            wake,
            done,
            state,
            sources,
        }
    }

    #[test]
    fn toggles_and_records_ping() {
        let rig = rig();
        rig.keeper.cycle(500);
        assert!(rig.wake.is_high());
        rig.keeper.cycle(1000);
        assert!(!rig.wake.is_high());
        assert_eq!(rig.state.time_since_last_ping(1200), Some(200));
        assert!(!rig.sources.combined());
    }

    #[test]
    fn timed_out_input_raises_flag_only() {
        let rig = rig();
        rig.done.set_level(true);
        rig.keeper.cycle(500);
        assert!(rig.sources.is_asserted(ResetSourceKind::Watchdog));
        assert!(!rig.sources.is_latched());
        // Keep-alive continues; the arbitrator owns the reset.
        assert!(rig.wake.is_high());
    }

    #[test]
    fn starving_stops_keep_alive() {
        let rig = rig();
        rig.keeper.cycle(500);
        rig.state.trigger_reset(&rig.sources);
        let writes = rig.wake.history().len();
        for t in (1000..=5000).step_by(500) {
            rig.keeper.cycle(t);
        }
        assert_eq!(rig.wake.history().len(), writes);
        assert_eq!(rig.state.time_since_last_ping(5000), Some(4500));
        assert!(rig.sources.is_asserted(ResetSourceKind::Watchdog));
    }
}
