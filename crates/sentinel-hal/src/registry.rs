//! [`Board`] – the bundle of hardware handles the watchdog runs against.
//!
//! The runtime never looks a driver up by name: each task is handed exactly
//! the lines and capabilities it drives when the system is built.  A `Board`
//! is that hand-off point.
//!
//! # Line map
//!
//! | Field | Direction | Driven by |
//! |---|---|---|
//! | `heartbeat_in` | in | OBC liveness pulse |
//! | `heartbeat_out` | out | heartbeat monitor (1 Hz square wave) |
//! | `fault_active` | out | fault dispatcher, reset arbitrator |
//! | `reset_request` | out | fault dispatcher (companion nudge) |
//! | `reset_out` | out | reset arbitrator (final hardware reset) |
//! | `power_switches` | out | fault dispatcher (power cycle) |
//! | `wdog_wake` | out | watchdog keeper (keep-alive) |
//! | `wdog_done` | in | external watchdog "timed out" |
//! | `power_supervisor` | in | optional brown-out supervisor |
//! | `manual_reset` | in | optional reset button |

use std::sync::Arc;

use sentinel_types::SentinelError;
use tracing::warn;

use crate::indicator::IndicatorSink;
use crate::inference::InferenceEngine;
use crate::line::{InputLine, OutputLine};
use crate::sensors::SensorProvider;
use crate::serial::SerialTransport;

/// Every hardware handle the watchdog module needs.
pub struct Board {
    pub heartbeat_in: Arc<dyn InputLine>,
    pub heartbeat_out: Arc<dyn OutputLine>,
    pub fault_active: Arc<dyn OutputLine>,
    pub reset_request: Arc<dyn OutputLine>,
    pub reset_out: Arc<dyn OutputLine>,
    pub power_switches: Vec<Arc<dyn OutputLine>>,
    pub wdog_wake: Arc<dyn OutputLine>,
    pub wdog_done: Arc<dyn InputLine>,
    pub power_supervisor: Option<Arc<dyn InputLine>>,
    pub manual_reset: Option<Arc<dyn InputLine>>,
    pub serial: Arc<dyn SerialTransport>,
    pub sensors: Arc<dyn SensorProvider>,
    pub indicators: Arc<dyn IndicatorSink>,
    pub engine: Box<dyn InferenceEngine>,
}

impl Board {
    /// Drive every output to its power-on state: signal lines low, power
    /// switches closed (high).
    ///
    /// Every line is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`SentinelError::LineFault`] encountered.
    pub fn apply_safe_state(&self) -> Result<(), SentinelError> {
        let mut first_error = None;
        let lows = [
            &self.heartbeat_out,
            &self.fault_active,
            &self.reset_request,
            &self.reset_out,
            &self.wdog_wake,
        ];
        for line in lows {
            if let Err(e) = line.set(false) {
                warn!(line = line.id(), error = %e, "failed to apply safe state");
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = set_all(&self.power_switches, true) {
            first_error.get_or_insert(e);
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Drive every line in `lines` to `high`, attempting all of them.
///
/// # Errors
///
/// Returns the first [`SentinelError::LineFault`] encountered.
pub fn set_all(lines: &[Arc<dyn OutputLine>], high: bool) -> Result<(), SentinelError> {
    let mut first_error = None;
    for line in lines {
        if let Err(e) = line.set(high) {
            warn!(line = line.id(), high, error = %e, "line write failed");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBoard, SimOutputLine};

    #[test]
    fn safe_state_drives_signals_low_and_power_high() {
        let (board, sim) = SimBoard::new().build();
        sim.fault_active.set(true).unwrap();
        sim.reset_out.set(true).unwrap();

        board.apply_safe_state().unwrap();

        assert!(!sim.fault_active.is_high());
        assert!(!sim.reset_out.is_high());
        assert!(!sim.reset_request.is_high());
        assert!(sim.power_switches.iter().all(|l| l.is_high()));
    }

    #[test]
    fn set_all_attempts_every_line_and_reports_first_error() {
        let good = SimOutputLine::new("good");
        let bad = SimOutputLine::new("bad");
        bad.fail_writes(true);
        let also_good = SimOutputLine::new("also_good");
        let lines: Vec<Arc<dyn OutputLine>> = vec![good.clone(), bad.clone(), also_good.clone()];

        let err = set_all(&lines, true).unwrap_err();
        assert!(err.to_string().contains("bad"));
        assert!(good.is_high());
        assert!(also_good.is_high());
        assert!(!bad.is_high());
    }
}
