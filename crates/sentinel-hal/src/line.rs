//! Discrete digital lines: outputs (reset pulses, keep-alive, power
//! switches, the fault-active signal) and inputs (heartbeat, watchdog
//! timed-out, power supervisor, manual button).
//!
//! Lines are shared between tasks (the fault-active output is driven by both
//! the fault dispatcher and the reset arbitrator), so every method takes
//! `&self` and drivers use interior mutability.

use sentinel_types::SentinelError;

/// A push-pull digital output.
pub trait OutputLine: Send + Sync {
    /// Stable identifier for this line, e.g. `"reset_out"`.
    fn id(&self) -> &str;

    /// Drive the line high (`true`) or low (`false`).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::LineFault`] if the level cannot be applied.
    fn set(&self, high: bool) -> Result<(), SentinelError>;

    /// Last level written to the line.
    fn is_high(&self) -> bool;

    /// Invert the line and return the new level.
    ///
    /// # Errors
    ///
    /// Propagates the error from [`OutputLine::set`].
    fn toggle(&self) -> Result<bool, SentinelError> {
        let next = !self.is_high();
        self.set(next)?;
        Ok(next)
    }
}

/// A sampled digital input.
pub trait InputLine: Send + Sync {
    /// Stable identifier for this line, e.g. `"heartbeat_in"`.
    fn id(&self) -> &str;

    /// Current level of the line.
    fn is_high(&self) -> bool;
}
