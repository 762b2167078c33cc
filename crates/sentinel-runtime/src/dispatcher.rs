//! [`FaultDispatcher`] – the sole consumer of the fault channel.
//!
//! Reports are mitigated strictly one at a time: the dispatcher awaits the
//! next report only after the previous mitigation, including the
//! fault-active hold, has run to completion.
//!
//! | Fault | Mode | Mitigation |
//! |---|---|---|
//! | `NoHeartbeat` | `ObcFault` | 100 ms pulse on the reset-request line |
//! | `Overcurrent` | `Warning` | power switches low for 1000 ms, then high |
//! | `TtcTimeout` | `TtcFault` | transport restart, link state re-armed |
//! | `DataCorruption` | `Warning` | retransmission request frame |
//!
//! The fault-active line is raised before mitigation and cleared 1000 ms
//! after it was raised, or as soon as mitigation ends if that took longer.

use std::sync::Arc;

use sentinel_hal::{IndicatorSink, OutputLine, SerialTransport, set_all};
use sentinel_kernel::policy::{
    DATA_CORRUPTION_BLINK_MS, FAULT_ACTIVE_HOLD, OVERCURRENT_BLINK_MS, POWER_CYCLE_OFF_TIME,
    RESET_REQUEST_PULSE,
};
use sentinel_kernel::{LinkCell, ModeCell, MonotonicClock, Transition};
use sentinel_middleware::FaultReceiver;
use sentinel_types::{FaultKind, FaultReport, IndicatorId, RETRANSMIT_REQUEST, SystemMode};
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{Instrument, debug, info, info_span, warn};

/// Output lines driven by the dispatcher.
pub struct DispatchLines {
    pub fault_active: Arc<dyn OutputLine>,
    pub reset_request: Arc<dyn OutputLine>,
    pub power_switches: Vec<Arc<dyn OutputLine>>,
}

pub struct FaultDispatcher {
    faults: FaultReceiver,
    lines: DispatchLines,
    serial: Arc<dyn SerialTransport>,
    indicators: Arc<dyn IndicatorSink>,
    mode: Arc<ModeCell>,
    link: Arc<LinkCell>,
    clock: MonotonicClock,
}

impl FaultDispatcher {
    pub fn new(
        faults: FaultReceiver,
        lines: DispatchLines,
        serial: Arc<dyn SerialTransport>,
        indicators: Arc<dyn IndicatorSink>,
        mode: Arc<ModeCell>,
        link: Arc<LinkCell>,
        clock: MonotonicClock,
    ) -> Self {
        Self {
            faults,
            lines,
            serial,
            indicators,
            mode,
            link,
            clock,
        }
    }

    pub async fn run(mut self) {
        while let Some(report) = self.faults.recv().await {
            let span = info_span!("mitigation", kind = %report.kind());
            self.handle(report).instrument(span).await;
        }
        warn!("fault channel closed; dispatcher stopping");
    }

    /// Mitigate one report to completion.
    pub async fn handle(&self, report: FaultReport) {
        let kind = report.kind();
        if !kind.is_fault() {
            debug!("ignoring report without a fault class");
            return;
        }

        let asserted_at = Instant::now();
        let tick_ms = self.clock.ms_at(asserted_at);
        info!(
            kind = %kind,
            confidence = report.confidence(),
            detected_ms = report.timestamp_ms(),
            tick_ms,
            "mitigation started"
        );

        self.indicate(kind);
        if let Some(mode) = SystemMode::for_fault(kind) {
            if self.mode.transition(mode, tick_ms) == Transition::Refused {
                debug!(mode = %mode, "reset pending; mode left unchanged");
            }
        }
        self.drive(&self.lines.fault_active, true);

        match kind {
            FaultKind::None => {}
            FaultKind::NoHeartbeat => self.pulse_reset_request().await,
            FaultKind::Overcurrent => self.power_cycle().await,
            FaultKind::TtcTimeout => self.restart_link().await,
            FaultKind::DataCorruption => self.request_retransmission().await,
        }

        sleep_until(asserted_at + FAULT_ACTIVE_HOLD).await;
        self.drive(&self.lines.fault_active, false);
        info!(
            kind = %kind,
            elapsed_ms = asserted_at.elapsed().as_millis() as u64,
            "mitigation finished"
        );
    }

    fn indicate(&self, kind: FaultKind) {
        let panel = &self.indicators;
        panel.set_indicator(IndicatorId::FaultObc, false);
        panel.set_indicator(IndicatorId::FaultTtc, false);
        panel.set_indicator(IndicatorId::Warning, false);
        match kind {
            FaultKind::None => {}
            FaultKind::NoHeartbeat => {
                panel.set_indicator(IndicatorId::FaultObc, true);
                panel.set_indicator(IndicatorId::SysOk, false);
            }
            FaultKind::Overcurrent => {
                panel.set_indicator(IndicatorId::Warning, true);
                panel.set_indicator_blink(IndicatorId::Warning, OVERCURRENT_BLINK_MS);
            }
            FaultKind::TtcTimeout => {
                panel.set_indicator(IndicatorId::FaultTtc, true);
                panel.set_indicator(IndicatorId::SysOk, false);
            }
            FaultKind::DataCorruption => {
                panel.set_indicator(IndicatorId::Warning, true);
                panel.set_indicator_blink(IndicatorId::Warning, DATA_CORRUPTION_BLINK_MS);
            }
        }
    }

    fn drive(&self, line: &Arc<dyn OutputLine>, high: bool) {
        if let Err(e) = line.set(high) {
            warn!(line = line.id(), high, error = %e, "line write failed during mitigation");
        }
    }

    async fn pulse_reset_request(&self) {
        self.drive(&self.lines.reset_request, true);
        sleep(RESET_REQUEST_PULSE).await;
        self.drive(&self.lines.reset_request, false);
    }

    async fn power_cycle(&self) {
        self.switch_all(false);
        sleep(POWER_CYCLE_OFF_TIME).await;
        self.switch_all(true);
    }

    /// Every switch is attempted even when one fails; `set_all` warns per line.
    fn switch_all(&self, on: bool) {
        match set_all(&self.lines.power_switches, on) {
            Ok(()) => debug!(on, "power switches driven"),
            Err(e) => debug!(on, error = %e, "power cycle continued past a failed switch"),
        }
    }

    async fn restart_link(&self) {
        match self.serial.reinit().await {
            Ok(()) => {
                self.link.rearm(self.clock.now_ms());
                info!("TTC link restarted");
            }
            Err(e) => warn!(error = %e, "TTC link restart failed"),
        }
    }

    async fn request_retransmission(&self) {
        if let Err(e) = self.serial.send(&RETRANSMIT_REQUEST).await {
            warn!(error = %e, "retransmission request failed");
        }
    }
}
