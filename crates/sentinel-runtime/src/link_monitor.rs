//! TTC link monitor task.
//!
//! Waits on two things at once: the transport's receive stream, which
//! refreshes link recency, and a 100 ms cadence that checks for timeout and
//! counts down to the next telemetry frame.

use std::sync::Arc;

use futures_util::StreamExt;
use sentinel_hal::{IndicatorSink, SerialTransport};
use sentinel_kernel::policy::LINK_MONITOR_PERIOD;
use sentinel_kernel::{Cadence, LinkCell, LinkTracker, ModeCell, MonotonicClock, ResetSources};
use sentinel_middleware::FaultSender;
use sentinel_types::{IndicatorId, TelemetryFrame};
use tracing::{debug, trace, warn};

pub struct LinkMonitor {
    serial: Arc<dyn SerialTransport>,
    link: Arc<LinkCell>,
    mode: Arc<ModeCell>,
    reset: Arc<ResetSources>,
    faults: FaultSender,
    indicators: Arc<dyn IndicatorSink>,
    clock: MonotonicClock,
    tracker: LinkTracker,
    comm_shown: Option<bool>,
}

impl LinkMonitor {
    pub fn new(
        serial: Arc<dyn SerialTransport>,
        link: Arc<LinkCell>,
        mode: Arc<ModeCell>,
        reset: Arc<ResetSources>,
        faults: FaultSender,
        indicators: Arc<dyn IndicatorSink>,
        clock: MonotonicClock,
    ) -> Self {
        Self {
            serial,
            link,
            mode,
            reset,
            faults,
            indicators,
            clock,
            tracker: LinkTracker::new(),
            comm_shown: None,
        }
    }

    pub fn on_rx(&self, len: usize, now_ms: u64) {
        trace!(len, tick_ms = now_ms, "TTC rx");
        self.link.record_rx(now_ms);
    }

    pub async fn cycle(&mut self, now_ms: u64) {
        let cycle = self.tracker.cycle(&self.link, now_ms);

        let healthy = self.link.is_healthy();
        if self.comm_shown != Some(healthy) {
            self.indicators.set_indicator(IndicatorId::CommActive, healthy);
            self.comm_shown = Some(healthy);
        }

        if let Some(report) = cycle.fault {
            warn!(
                kind = %report.kind(),
                confidence = report.confidence(),
                tick_ms = now_ms,
                last_rx_ms = self.link.last_rx_ms(),
                "TTC link silent"
            );
            self.faults.try_push(report);
        }

        if cycle.send_telemetry {
            let frame = TelemetryFrame::new(self.mode.get(), self.reset.is_latched());
            match self.serial.send(&frame.encode()).await {
                Ok(()) => debug!(mode = %frame.mode, latched = frame.reset_latched, "telemetry sent"),
                Err(e) => warn!(error = %e, "telemetry send failed"),
            }
        }
    }

    pub async fn run(mut self) {
        let mut rx = self.serial.rx_stream().fuse();
        let mut cadence = Cadence::new(LINK_MONITOR_PERIOD);
        loop {
            tokio::select! {
                deadline = cadence.tick() => {
                    let now_ms = self.clock.ms_at(deadline);
                    self.cycle(now_ms).await;
                }
                Some(event) = rx.next() => {
                    self.on_rx(event.bytes.len(), self.clock.now_ms());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_hal::sim::{SimIndicators, SimSerial};
    use sentinel_middleware::{FaultReceiver, ModeBus, fault_channel};
    use sentinel_types::{FaultKind, SystemMode};
    use std::time::Duration;

    struct Rig {
        serial: Arc<SimSerial>,
        link: Arc<LinkCell>,
        rx: FaultReceiver,
        reset: Arc<ResetSources>,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_monitor() -> Rig {
        let serial = SimSerial::new();
        let link = Arc::new(LinkCell::new(0));
        let mode = Arc::new(ModeCell::new(ModeBus::default()));
        mode.transition(SystemMode::Normal, 0);
        let reset = Arc::new(ResetSources::new());
        let (tx, rx) = fault_channel();
        let monitor = LinkMonitor::new(
            serial.clone(),
            link.clone(),
            mode,
            reset.clone(),
            tx,
            SimIndicators::new(),
            MonotonicClock::start(),
        );
        Rig {
            serial,
            link,
            rx,
            reset,
            task: tokio::spawn(monitor.run()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn traffic_keeps_link_healthy() {
        let rig = spawn_monitor();
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(250)).await;
            rig.serial.inject_rx(b"cmd");
        }
        assert!(rig.link.is_healthy());
        assert!(rig.rx.is_empty());
        rig.task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn silence_pushes_every_cycle() {
        let mut rig = spawn_monitor();
        // Checks at 2100, 2200 and 2300 are past the timeout.
        tokio::time::sleep(Duration::from_millis(2350)).await;
        let mut count = 0;
        while let Some(report) = rig.rx.try_recv() {
            assert_eq!(report.kind(), FaultKind::TtcTimeout);
            count += 1;
        }
        assert_eq!(count, 3);
        assert!(!rig.link.is_healthy());
        rig.task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn telemetry_every_fifty_cycles() {
        let rig = spawn_monitor();
        rig.reset.try_latch();
        tokio::time::sleep(Duration::from_millis(15_050)).await;

        let frames = rig.serial.telemetry_frames();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.reset_latched));
        assert!(rig.serial.sent().iter().all(|f| f.bytes[0] == 0xAA));
        let times: Vec<_> = rig.serial.sent().iter().map(|f| f.at).collect();
        assert_eq!(times[1] - times[0], Duration::from_secs(5));
        rig.task.abort();
    }
}
