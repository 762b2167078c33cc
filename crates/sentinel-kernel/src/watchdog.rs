//! [`WatchdogState`] – external hardware watchdog bookkeeping.
//!
//! The watchdog keeper task toggles the keep-alive line every
//! [`WATCHDOG_KEEPER_PERIOD`] and calls [`WatchdogState::record_ping`].
//! [`WatchdogState::trigger_reset`] is the escape hatch: it asserts the
//! watchdog reset source and *starves* the external watchdog by stopping
//! keep-alive toggling, so the hardware itself eventually fires.  That path
//! is independent of the reset arbitrator's own pulse.
//!
//! [`WATCHDOG_KEEPER_PERIOD`]: crate::policy::WATCHDOG_KEEPER_PERIOD

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use sentinel_types::ResetSourceKind;
use tracing::error;

use crate::policy::WATCHDOG_KEEPER_PERIOD;
use crate::state::ResetSources;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Keep-alive health as seen from diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingHealth {
    /// The keeper has not pinged yet.
    NotStarted,
    /// Pinged within two keeper periods.
    Fresh,
    /// The keeper is late or has been deliberately starved.
    Stale,
}

// ────────────────────────────────────────────────────────────────────────────
// WatchdogState
// ────────────────────────────────────────────────────────────────────────────

/// Shared between the keeper task and anyone asking for diagnostics.
#[derive(Debug, Default)]
pub struct WatchdogState {
    last_ping_ms: AtomicU64,
    initialized: AtomicBool,
    starving: AtomicBool,
}

impl WatchdogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a keep-alive toggle at `now_ms`.
    pub fn record_ping(&self, now_ms: u64) {
        self.last_ping_ms.store(now_ms, Ordering::SeqCst);
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Milliseconds since the last keep-alive, `None` before the first one.
    pub fn time_since_last_ping(&self, now_ms: u64) -> Option<u64> {
        self.is_initialized()
            .then(|| now_ms.saturating_sub(self.last_ping_ms.load(Ordering::SeqCst)))
    }

    pub fn health(&self, now_ms: u64) -> PingHealth {
        let limit = 2 * u64::try_from(WATCHDOG_KEEPER_PERIOD.as_millis()).unwrap_or(u64::MAX);
        match self.time_since_last_ping(now_ms) {
            None => PingHealth::NotStarted,
            Some(_) if self.is_starving() => PingHealth::Stale,
            Some(elapsed) if elapsed <= limit => PingHealth::Fresh,
            Some(_) => PingHealth::Stale,
        }
    }

    /// While starving, the keeper must not toggle the keep-alive line.
    pub fn is_starving(&self) -> bool {
        self.starving.load(Ordering::SeqCst)
    }

    /// Assert the watchdog reset source and stop feeding the external
    /// watchdog.
    pub fn trigger_reset(&self, sources: &ResetSources) {
        error!("watchdog reset triggered; starving external watchdog");
        self.starving.store(true, Ordering::SeqCst);
        sources.assert(ResetSourceKind::Watchdog);
    }
}
