//! Reset arbitrator task.
//!
//! Polls the [`ResetArbiter`] every 100 ms.  The cycle that wins the latch
//! runs the controlled shutdown and issues the single hardware reset pulse;
//! every later cycle sees the latch and does nothing.

use std::sync::Arc;

use sentinel_hal::{IndicatorSink, OutputLine};
use sentinel_kernel::policy::{
    RESET_ARBITER_PERIOD, RESET_OUT_PULSE, RESET_PENDING_BLINK_MS, RESET_SHUTDOWN_GRACE,
};
use sentinel_kernel::{Arbitration, Cadence, ModeCell, MonotonicClock, ResetArbiter};
use sentinel_types::{IndicatorId, ResetSourceKind, SystemMode};
use tokio::time::sleep;
use tracing::{error, info, trace, warn};

pub struct ResetArbitrator {
    arbiter: ResetArbiter,
    mode: Arc<ModeCell>,
    fault_active: Arc<dyn OutputLine>,
    reset_out: Arc<dyn OutputLine>,
    indicators: Arc<dyn IndicatorSink>,
    clock: MonotonicClock,
}

impl ResetArbitrator {
    pub fn new(
        arbiter: ResetArbiter,
        mode: Arc<ModeCell>,
        fault_active: Arc<dyn OutputLine>,
        reset_out: Arc<dyn OutputLine>,
        indicators: Arc<dyn IndicatorSink>,
        clock: MonotonicClock,
    ) -> Self {
        Self {
            arbiter,
            mode,
            fault_active,
            reset_out,
            indicators,
            clock,
        }
    }

    pub async fn cycle(&self, now_ms: u64) {
        match self.arbiter.evaluate() {
            Arbitration::Idle | Arbitration::Latched => trace!(tick_ms = now_ms, "no reset"),
            Arbitration::Fire { sources } => self.execute(&sources, now_ms).await,
        }
    }

    async fn execute(&self, sources: &[ResetSourceKind], now_ms: u64) {
        let names: Vec<&str> = sources.iter().map(|s| s.as_str()).collect();
        error!(sources = ?names, tick_ms = now_ms, "reset latched");

        self.mode.transition(SystemMode::ResetPending, now_ms);
        if let Err(e) = self.fault_active.set(true) {
            warn!(error = %e, "failed to assert fault-active before reset");
        }

        self.indicators.set_indicator(IndicatorId::Warning, true);
        self.indicators
            .set_indicator_blink(IndicatorId::Warning, RESET_PENDING_BLINK_MS);
        info!(
            grace_ms = RESET_SHUTDOWN_GRACE.as_millis() as u64,
            "quiescing before hardware reset"
        );
        sleep(RESET_SHUTDOWN_GRACE).await;

        if let Err(e) = self.reset_out.set(true) {
            error!(error = %e, "reset line write failed");
        }
        sleep(RESET_OUT_PULSE).await;
        if let Err(e) = self.reset_out.set(false) {
            error!(error = %e, "reset line release failed");
        }
        info!(tick_ms = self.clock.now_ms(), "hardware reset pulse issued");
    }

    pub async fn run(self) {
        let mut cadence = Cadence::new(RESET_ARBITER_PERIOD);
        loop {
            let deadline = cadence.tick().await;
            self.cycle(self.clock.ms_at(deadline)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_hal::sim::{SimIndicators, SimOutputLine};
    use sentinel_kernel::ResetSources;
    use sentinel_middleware::ModeBus;
    use std::time::Duration;
    use tokio::time::Instant;

    struct Rig {
        sources: Arc<ResetSources>,
        mode: Arc<ModeCell>,
        fault_active: Arc<SimOutputLine>,
        reset_out: Arc<SimOutputLine>,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_arbitrator() -> Rig {
        let sources = Arc::new(ResetSources::new());
        let mode = Arc::new(ModeCell::new(ModeBus::default()));
        mode.transition(SystemMode::Normal, 0);
        let fault_active = SimOutputLine::new("fault_active");
        let reset_out = SimOutputLine::new("reset_out");
        let arbitrator = ResetArbitrator::new(
            ResetArbiter::new(sources.clone(), Vec::new()),
            mode.clone(),
            fault_active.clone(),
            reset_out.clone(),
            SimIndicators::new(),
            MonotonicClock::start(),
        );
        Rig {
            sources,
            mode,
            fault_active,
            reset_out,
            task: tokio::spawn(arbitrator.run()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_sources_never_pulse() {
        let rig = spawn_arbitrator();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rig.reset_out.history().is_empty());
        assert_eq!(rig.mode.get(), SystemMode::Normal);
        rig.task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn software_request_fires_single_pulse() {
        let start = Instant::now();
        let rig = spawn_arbitrator();
        tokio::time::sleep(Duration::from_millis(250)).await;
        rig.sources.assert(ResetSourceKind::Software);
        tokio::time::sleep(Duration::from_secs(10)).await;

        // Seen on the 300 ms cycle, pulse after the 500 ms grace.
        let pulses = rig.reset_out.pulses();
        assert_eq!(pulses.len(), 1);
        assert_eq!(pulses[0].start, start + Duration::from_millis(800));
        assert_eq!(pulses[0].width, RESET_OUT_PULSE);
        assert!(rig.fault_active.is_high());
        assert_eq!(rig.mode.get(), SystemMode::ResetPending);
        assert!(rig.sources.is_latched());
        rig.task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn further_sources_after_latch_are_ignored() {
        let rig = spawn_arbitrator();
        rig.sources.assert(ResetSourceKind::Watchdog);
        tokio::time::sleep(Duration::from_secs(2)).await;
        rig.sources.assert(ResetSourceKind::Manual);
        rig.sources.assert(ResetSourceKind::PowerSupervisor);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rig.reset_out.rising_edges(), 1);
        rig.task.abort();
    }
}
