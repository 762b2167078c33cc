//! [`HeartbeatTracker`] – OBC liveness detection.
//!
//! Pure decision logic for the heartbeat monitor.  The runtime task samples
//! the input line every [`HEARTBEAT_SAMPLE_PERIOD`] and feeds the level and
//! the current tick into [`HeartbeatTracker::sample`]; the tracker reports
//! what happened and, at most once per healthy→unhealthy transition, a
//! [`FaultKind::NoHeartbeat`] report.
//!
//! Rising edges are classified by the interval since the last accepted
//! pulse:
//!
//! | Interval | Verdict |
//! |---|---|
//! | `<= 50 ms` | glitch, ignored |
//! | `50 < i < 5000 ms` | valid pulse, health restored |
//! | `>= 5000 ms` | stale, health not restored |
//!
//! A stale edge only re-arms the measurement once the timeout has fired.
//! While the OBC is still considered healthy the timeout keeps running from
//! the last accepted pulse.
//!
//! [`HEARTBEAT_SAMPLE_PERIOD`]: crate::policy::HEARTBEAT_SAMPLE_PERIOD

use sentinel_types::{FaultKind, FaultReport};

use crate::policy::{
    HEARTBEAT_FAULT_CONFIDENCE, HEARTBEAT_MAX_INTERVAL_MS, HEARTBEAT_MIN_INTERVAL_MS,
    HEARTBEAT_TIMEOUT_MS,
};
use crate::state::HeartbeatSnapshot;

/// Classification of the input level seen in one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeVerdict {
    NoEdge,
    Accepted { period_ms: u64 },
    Glitch { interval_ms: u64 },
    Stale { interval_ms: u64 },
}

/// Result of one [`HeartbeatTracker::sample`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartbeatSample {
    pub edge: EdgeVerdict,
    pub fault: Option<FaultReport>,
}

#[derive(Debug, Clone)]
pub struct HeartbeatTracker {
    last_pulse_ms: u64,
    measured_period_ms: u64,
    pulse_count: u32,
    healthy: bool,
    previous_level: bool,
    indicator_lit: bool,
}

impl HeartbeatTracker {
    /// A tracker that considers the OBC healthy and just seen at `now_ms`,
    /// so no fault fires during boot.
    pub fn new(now_ms: u64) -> Self {
        Self {
            last_pulse_ms: now_ms,
            measured_period_ms: 0,
            pulse_count: 0,
            healthy: true,
            previous_level: false,
            indicator_lit: false,
        }
    }

    pub fn sample(&mut self, level: bool, now_ms: u64) -> HeartbeatSample {
        // The indicator shows a validated pulse for exactly one cycle.
        self.indicator_lit = false;

        let rising = level && !self.previous_level;
        self.previous_level = level;

        let edge = if rising {
            self.on_rising_edge(now_ms)
        } else {
            EdgeVerdict::NoEdge
        };

        let mut fault = None;
        if self.healthy && now_ms.saturating_sub(self.last_pulse_ms) > HEARTBEAT_TIMEOUT_MS {
            self.healthy = false;
            fault = Some(FaultReport::new(
                FaultKind::NoHeartbeat,
                HEARTBEAT_FAULT_CONFIDENCE,
                now_ms,
            ));
        }

        HeartbeatSample { edge, fault }
    }

    fn on_rising_edge(&mut self, now_ms: u64) -> EdgeVerdict {
        let interval_ms = now_ms.saturating_sub(self.last_pulse_ms);
        if interval_ms <= HEARTBEAT_MIN_INTERVAL_MS {
            return EdgeVerdict::Glitch { interval_ms };
        }
        if interval_ms >= HEARTBEAT_MAX_INTERVAL_MS {
            if !self.healthy {
                self.last_pulse_ms = now_ms;
            }
            return EdgeVerdict::Stale { interval_ms };
        }
        self.last_pulse_ms = now_ms;
        self.measured_period_ms = interval_ms;
        self.pulse_count = self.pulse_count.wrapping_add(1);
        self.healthy = true;
        self.indicator_lit = true;
        EdgeVerdict::Accepted {
            period_ms: interval_ms,
        }
    }

    /// Healthy flag set and the last pulse recent enough.
    pub fn is_healthy(&self, now_ms: u64) -> bool {
        self.healthy && now_ms.saturating_sub(self.last_pulse_ms) < HEARTBEAT_TIMEOUT_MS
    }

    pub fn snapshot(&self) -> HeartbeatSnapshot {
        HeartbeatSnapshot {
            last_pulse_ms: self.last_pulse_ms,
            measured_period_ms: u32::try_from(self.measured_period_ms).unwrap_or(u32::MAX),
            pulse_count: self.pulse_count,
            healthy: self.healthy,
            indicator_lit: self.indicator_lit,
        }
    }
}
