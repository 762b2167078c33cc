//! [`LinkTracker`] – TTC link liveness and telemetry cadence.
//!
//! Unlike the heartbeat tracker, the link timeout is level-triggered: every
//! cycle spent past the timeout produces another
//! [`FaultKind::TtcTimeout`] report.  Drops on a full fault channel are
//! compensated by the next cycle's re-detection.

use sentinel_types::{FaultKind, FaultReport};

use crate::policy::{LINK_FAULT_CONFIDENCE, LINK_TIMEOUT_MS, TELEMETRY_EVERY_CYCLES};
use crate::state::LinkCell;

/// What the link monitor must do after one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkCycle {
    pub fault: Option<FaultReport>,
    pub send_telemetry: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LinkTracker {
    telemetry_counter: u32,
}

impl LinkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one monitor cycle against the shared `link` state.
    pub fn cycle(&mut self, link: &LinkCell, now_ms: u64) -> LinkCycle {
        let mut fault = None;
        if now_ms.saturating_sub(link.last_rx_ms()) > LINK_TIMEOUT_MS {
            link.mark_unhealthy();
            fault = Some(FaultReport::new(
                FaultKind::TtcTimeout,
                LINK_FAULT_CONFIDENCE,
                now_ms,
            ));
        }

        self.telemetry_counter += 1;
        let send_telemetry = self.telemetry_counter >= TELEMETRY_EVERY_CYCLES;
        if send_telemetry {
            self.telemetry_counter = 0;
        }

        LinkCycle {
            fault,
            send_telemetry,
        }
    }

    pub fn telemetry_counter(&self) -> u32 {
        self.telemetry_counter
    }
}
