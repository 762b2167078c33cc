//! Shared state cells.
//!
//! Each record lives in an `Arc` handed to exactly the tasks that touch it.
//! Every field is an atomic, so no lock is ever held across a suspension
//! point.
//!
//! | Cell | Writers | Readers |
//! |---|---|---|
//! | [`ResetSources`] | watchdog keeper, dispatcher / external API, arbitrator | arbitrator, link monitor |
//! | [`ModeCell`] | boot sequence, dispatcher, arbitrator | indicator refresh, link monitor |
//! | [`HeartbeatCell`] | heartbeat monitor | classifier |
//! | [`LinkCell`] | link monitor, dispatcher (restart re-arm) | classifier |

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

use sentinel_middleware::{ModeBus, ModeChange};
use sentinel_types::{ResetSourceKind, SystemMode};
use tracing::info;

// ────────────────────────────────────────────────────────────────────────────
// ResetSources
// ────────────────────────────────────────────────────────────────────────────

/// Reset-source flags plus the one-shot arbitration latch.
///
/// Flags are set-only: nothing in the process ever clears them.  The only
/// way back is the hardware reset, which rebuilds the cell.
#[derive(Debug, Default)]
pub struct ResetSources {
    watchdog: AtomicBool,
    power_supervisor: AtomicBool,
    software: AtomicBool,
    manual: AtomicBool,
    latched: AtomicBool,
}

/// Point-in-time copy of [`ResetSources`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSnapshot {
    pub watchdog: bool,
    pub power_supervisor: bool,
    pub software: bool,
    pub manual: bool,
    pub latched: bool,
}

impl ResetSnapshot {
    /// Logical OR of the four sources.
    pub fn combined(&self) -> bool {
        self.watchdog || self.power_supervisor || self.software || self.manual
    }

    pub fn asserted(&self) -> Vec<ResetSourceKind> {
        ResetSourceKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                ResetSourceKind::Watchdog => self.watchdog,
                ResetSourceKind::PowerSupervisor => self.power_supervisor,
                ResetSourceKind::Software => self.software,
                ResetSourceKind::Manual => self.manual,
            })
            .collect()
    }
}

impl ResetSources {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, kind: ResetSourceKind) -> &AtomicBool {
        match kind {
            ResetSourceKind::Watchdog => &self.watchdog,
            ResetSourceKind::PowerSupervisor => &self.power_supervisor,
            ResetSourceKind::Software => &self.software,
            ResetSourceKind::Manual => &self.manual,
        }
    }

    /// Assert `kind`.  A plain store: concurrent writers cannot lose each
    /// other's assertion.
    pub fn assert(&self, kind: ResetSourceKind) {
        self.flag(kind).store(true, Ordering::SeqCst);
    }

    pub fn is_asserted(&self, kind: ResetSourceKind) -> bool {
        self.flag(kind).load(Ordering::SeqCst)
    }

    pub fn combined(&self) -> bool {
        ResetSourceKind::ALL
            .into_iter()
            .any(|kind| self.is_asserted(kind))
    }

    /// Set the latch.  Returns `true` only for the single caller that moved
    /// it from clear to set.
    pub fn try_latch(&self) -> bool {
        self.latched
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ResetSnapshot {
        ResetSnapshot {
            watchdog: self.is_asserted(ResetSourceKind::Watchdog),
            power_supervisor: self.is_asserted(ResetSourceKind::PowerSupervisor),
            software: self.is_asserted(ResetSourceKind::Software),
            manual: self.is_asserted(ResetSourceKind::Manual),
            latched: self.is_latched(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ModeCell
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of a [`ModeCell::transition`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed { from: SystemMode },
    Unchanged,
    /// The cell is in [`SystemMode::ResetPending`], which nothing may leave.
    Refused,
}

/// The system state machine: current [`SystemMode`] plus a notification
/// side-channel.
#[derive(Debug)]
pub struct ModeCell {
    mode: AtomicU8,
    bus: ModeBus,
}

impl ModeCell {
    /// A new cell in [`SystemMode::Boot`] publishing on `bus`.
    pub fn new(bus: ModeBus) -> Self {
        Self {
            mode: AtomicU8::new(SystemMode::Boot.ordinal()),
            bus,
        }
    }

    pub fn get(&self) -> SystemMode {
        SystemMode::from_ordinal(self.mode.load(Ordering::SeqCst)).unwrap_or_default()
    }

    pub fn bus(&self) -> &ModeBus {
        &self.bus
    }

    /// Move to `to`, publishing a [`ModeChange`] if the mode actually moved.
    pub fn transition(&self, to: SystemMode, tick_ms: u64) -> Transition {
        let mut current = self.mode.load(Ordering::SeqCst);
        loop {
            let from = SystemMode::from_ordinal(current).unwrap_or_default();
            if from == to {
                return Transition::Unchanged;
            }
            if from.is_terminal() {
                return Transition::Refused;
            }
            match self.mode.compare_exchange(
                current,
                to.ordinal(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    info!(from = %from, to = %to, tick_ms, "mode transition");
                    self.bus.publish(ModeChange { from, to, tick_ms });
                    return Transition::Changed { from };
                }
                Err(actual) => current = actual,
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HeartbeatCell
// ────────────────────────────────────────────────────────────────────────────

/// Read-only view of the heartbeat monitor's state, published once per
/// monitor cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSnapshot {
    pub last_pulse_ms: u64,
    pub measured_period_ms: u32,
    pub pulse_count: u32,
    pub healthy: bool,
    pub indicator_lit: bool,
}

#[derive(Debug)]
pub struct HeartbeatCell {
    last_pulse_ms: AtomicU64,
    measured_period_ms: AtomicU32,
    pulse_count: AtomicU32,
    healthy: AtomicBool,
    indicator_lit: AtomicBool,
}

impl HeartbeatCell {
    /// Healthy and just seen at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            last_pulse_ms: AtomicU64::new(now_ms),
            measured_period_ms: AtomicU32::new(0),
            pulse_count: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
            indicator_lit: AtomicBool::new(false),
        }
    }

    pub fn publish(&self, snapshot: HeartbeatSnapshot) {
        self.last_pulse_ms
            .store(snapshot.last_pulse_ms, Ordering::SeqCst);
        self.measured_period_ms
            .store(snapshot.measured_period_ms, Ordering::SeqCst);
        self.pulse_count.store(snapshot.pulse_count, Ordering::SeqCst);
        self.indicator_lit
            .store(snapshot.indicator_lit, Ordering::SeqCst);
        self.healthy.store(snapshot.healthy, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> HeartbeatSnapshot {
        HeartbeatSnapshot {
            last_pulse_ms: self.last_pulse_ms.load(Ordering::SeqCst),
            measured_period_ms: self.measured_period_ms.load(Ordering::SeqCst),
            pulse_count: self.pulse_count.load(Ordering::SeqCst),
            healthy: self.healthy.load(Ordering::SeqCst),
            indicator_lit: self.indicator_lit.load(Ordering::SeqCst),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LinkCell
// ────────────────────────────────────────────────────────────────────────────

/// TTC link recency and health.
#[derive(Debug)]
pub struct LinkCell {
    last_rx_ms: AtomicU64,
    healthy: AtomicBool,
}

impl LinkCell {
    /// Healthy and just seen at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            last_rx_ms: AtomicU64::new(now_ms),
            healthy: AtomicBool::new(true),
        }
    }

    /// Inbound traffic observed at `now_ms`.
    pub fn record_rx(&self, now_ms: u64) {
        self.last_rx_ms.fetch_max(now_ms, Ordering::SeqCst);
        self.healthy.store(true, Ordering::SeqCst);
    }

    /// Return to "healthy, just seen" after a link restart.
    pub fn rearm(&self, now_ms: u64) {
        self.record_rx(now_ms);
    }

    pub fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::SeqCst);
    }

    pub fn last_rx_ms(&self) -> u64 {
        self.last_rx_ms.load(Ordering::SeqCst)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
