//! Heartbeat monitor and outward liveness beacon.
//!
//! [`HeartbeatMonitor`] samples the OBC heartbeat input every 100 ms and
//! pushes a single `NoHeartbeat` report per loss of health.
//! [`HeartbeatBeacon`] toggles the outward heartbeat line at 1 Hz on its own
//! cadence, so it keeps beating whatever the input is doing.

use std::sync::Arc;

use sentinel_hal::{IndicatorSink, InputLine, OutputLine};
use sentinel_kernel::policy::{HEARTBEAT_OUT_HALF_PERIOD, HEARTBEAT_SAMPLE_PERIOD};
use sentinel_kernel::{Cadence, EdgeVerdict, HeartbeatCell, HeartbeatTracker, MonotonicClock};
use sentinel_middleware::FaultSender;
use sentinel_types::IndicatorId;
use tracing::{debug, info, warn};

pub struct HeartbeatMonitor {
    input: Arc<dyn InputLine>,
    cell: Arc<HeartbeatCell>,
    faults: FaultSender,
    indicators: Arc<dyn IndicatorSink>,
    clock: MonotonicClock,
    tracker: HeartbeatTracker,
    indicator_shown: bool,
}

impl HeartbeatMonitor {
    pub fn new(
        input: Arc<dyn InputLine>,
        cell: Arc<HeartbeatCell>,
        faults: FaultSender,
        indicators: Arc<dyn IndicatorSink>,
        clock: MonotonicClock,
    ) -> Self {
        let tracker = HeartbeatTracker::new(cell.snapshot().last_pulse_ms);
        Self {
            input,
            cell,
            faults,
            indicators,
            clock,
            tracker,
            indicator_shown: false,
        }
    }

    /// One sampling cycle at tick `now_ms`.
    pub fn cycle(&mut self, now_ms: u64) {
        let sample = self.tracker.sample(self.input.is_high(), now_ms);
        match sample.edge {
            EdgeVerdict::NoEdge => {}
            EdgeVerdict::Accepted { period_ms } => {
                debug!(period_ms, tick_ms = now_ms, "heartbeat pulse");
            }
            EdgeVerdict::Glitch { interval_ms } => {
                debug!(interval_ms, tick_ms = now_ms, "heartbeat glitch ignored");
            }
            EdgeVerdict::Stale { interval_ms } => {
                info!(interval_ms, tick_ms = now_ms, "stale heartbeat edge rejected");
            }
        }

        let snapshot = self.tracker.snapshot();
        self.cell.publish(snapshot);
        if snapshot.indicator_lit != self.indicator_shown {
            self.indicators
                .set_indicator(IndicatorId::Heartbeat, snapshot.indicator_lit);
            self.indicator_shown = snapshot.indicator_lit;
        }

        if let Some(report) = sample.fault {
            warn!(
                kind = %report.kind(),
                confidence = report.confidence(),
                tick_ms = now_ms,
                last_pulse_ms = snapshot.last_pulse_ms,
                "heartbeat lost"
            );
            self.faults.try_push(report);
        }
    }

    pub async fn run(mut self) {
        let mut cadence = Cadence::new(HEARTBEAT_SAMPLE_PERIOD);
        loop {
            let deadline = cadence.tick().await;
            self.cycle(self.clock.ms_at(deadline));
        }
    }
}

/// 1 Hz square wave on the outward heartbeat line.
pub struct HeartbeatBeacon {
    output: Arc<dyn OutputLine>,
}

impl HeartbeatBeacon {
    pub fn new(output: Arc<dyn OutputLine>) -> Self {
        Self { output }
    }

    pub async fn run(self) {
        let mut cadence = Cadence::new(HEARTBEAT_OUT_HALF_PERIOD);
        loop {
            cadence.tick().await;
            if let Err(e) = self.output.toggle() {
                warn!(error = %e, "heartbeat output toggle failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_hal::sim::{SimIndicators, SimInputLine, SimOutputLine};
    use sentinel_middleware::fault_channel;
    use sentinel_types::FaultKind;
    use std::time::Duration;

    fn monitor() -> (
        HeartbeatMonitor,
        Arc<SimInputLine>,
        sentinel_middleware::FaultReceiver,
        Arc<HeartbeatCell>,
    ) {
        let input = SimInputLine::new("heartbeat_in");
        let cell = Arc::new(HeartbeatCell::new(0));
        let (tx, rx) = fault_channel();
        let m = HeartbeatMonitor::new(
            input.clone(),
            cell.clone(),
            tx,
            SimIndicators::new(),
            MonotonicClock::start(),
        );
        (m, input, rx, cell)
    }

    #[test]
    fn loss_is_reported_once_and_published() {
        let (mut m, input, mut rx, cell) = monitor();
        for t in (100..=3000).step_by(100) {
            input.set_level(t % 1000 == 0);
            m.cycle(t);
        }
        assert!(cell.is_healthy());
        assert_eq!(cell.snapshot().measured_period_ms, 1000);

        input.set_level(false);
        for t in (3100..=20_000).step_by(100) {
            m.cycle(t);
        }
        let report = rx.try_recv().unwrap();
        assert_eq!(report.kind(), FaultKind::NoHeartbeat);
        assert_eq!(report.timestamp_ms(), 8100);
        assert!(rx.try_recv().is_none());
        assert!(!cell.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn beacon_toggles_every_half_second() {
        let out = SimOutputLine::new("heartbeat_out");
        let task = tokio::spawn(HeartbeatBeacon::new(out.clone()).run());
        tokio::time::sleep(Duration::from_millis(4050)).await;
        task.abort();

        let pulses = out.pulses();
        assert_eq!(pulses.len(), 4);
        assert!(pulses.iter().all(|p| p.width == Duration::from_millis(500)));
    }
}
