//! Fixed policy constants.
//!
//! These values define the observable timing and decision behaviour of the
//! watchdog module.  Ground tooling depends on them exactly.

use std::time::Duration;

// ── Heartbeat monitor ───────────────────────────────────────────────────────

pub const HEARTBEAT_SAMPLE_PERIOD: Duration = Duration::from_millis(100);
/// A pulse is valid only if the interval since the previous one is strictly
/// greater than this.
pub const HEARTBEAT_MIN_INTERVAL_MS: u64 = 50;
/// A pulse is valid only if the interval since the previous one is strictly
/// less than this.
pub const HEARTBEAT_MAX_INTERVAL_MS: u64 = 5000;
/// Silence longer than this declares the OBC dead.
pub const HEARTBEAT_TIMEOUT_MS: u64 = 5000;
pub const HEARTBEAT_FAULT_CONFIDENCE: f32 = 0.95;
/// Half-period of the outward 1 Hz liveness square wave.
pub const HEARTBEAT_OUT_HALF_PERIOD: Duration = Duration::from_millis(500);

// ── Anomaly classifier ──────────────────────────────────────────────────────

pub const CLASSIFIER_PERIOD: Duration = Duration::from_millis(100);
/// A prediction is reported only when its confidence is strictly above this.
pub const CLASSIFIER_THRESHOLD: f32 = 0.70;

// ── Fault dispatcher ────────────────────────────────────────────────────────

/// Total time the fault-active line stays high, measured from assertion.
pub const FAULT_ACTIVE_HOLD: Duration = Duration::from_millis(1000);
pub const RESET_REQUEST_PULSE: Duration = Duration::from_millis(100);
pub const POWER_CYCLE_OFF_TIME: Duration = Duration::from_millis(1000);
pub const OVERCURRENT_BLINK_MS: u32 = 250;
pub const DATA_CORRUPTION_BLINK_MS: u32 = 100;

// ── Reset arbitrator ────────────────────────────────────────────────────────

pub const RESET_ARBITER_PERIOD: Duration = Duration::from_millis(100);
/// Quiesce window between latching a reset and pulsing the reset line.
pub const RESET_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);
pub const RESET_OUT_PULSE: Duration = Duration::from_millis(100);
pub const RESET_PENDING_BLINK_MS: u32 = 100;

// ── Watchdog keeper ─────────────────────────────────────────────────────────

pub const WATCHDOG_KEEPER_PERIOD: Duration = Duration::from_millis(500);

// ── TTC link monitor ────────────────────────────────────────────────────────

pub const LINK_MONITOR_PERIOD: Duration = Duration::from_millis(100);
pub const LINK_TIMEOUT_MS: u64 = 2000;
pub const LINK_FAULT_CONFIDENCE: f32 = 0.90;
/// Monitor cycles between telemetry frames (≈5 s).
pub const TELEMETRY_EVERY_CYCLES: u32 = 50;
