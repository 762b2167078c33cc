//! Shared data model for OBC Sentinel.
//!
//! Every crate in the workspace speaks in these types: fault classes and the
//! reports that carry them, the operating mode of the module, reset-source
//! identifiers, indicator identifiers and colours, the fixed-layout telemetry
//! frame, and the workspace-wide [`SentinelError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Anomaly class produced by the classifier or a liveness monitor.
///
/// The discriminants are the classifier's output ordinals and must not be
/// renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FaultKind {
    /// Normal operation; never dispatched.
    None = 0,
    /// The OBC stopped sending heartbeat pulses.
    NoHeartbeat = 1,
    /// A power rail is drawing too much current.
    Overcurrent = 2,
    /// Nothing has been received on the TTC link for too long.
    TtcTimeout = 3,
    /// Corrupted data observed on the TTC link.
    DataCorruption = 4,
}

impl FaultKind {
    /// Number of classes the classifier scores.
    pub const COUNT: usize = 5;

    /// Map a classifier output index to its fault class.
    pub fn from_class(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::None),
            1 => Some(Self::NoHeartbeat),
            2 => Some(Self::Overcurrent),
            3 => Some(Self::TtcTimeout),
            4 => Some(Self::DataCorruption),
            _ => None,
        }
    }

    /// Classifier output index of this class.
    pub fn class(self) -> usize {
        self as usize
    }

    /// `true` for every class except [`FaultKind::None`].
    pub fn is_fault(self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::NoHeartbeat => "no_heartbeat",
            Self::Overcurrent => "overcurrent",
            Self::TtcTimeout => "ttc_timeout",
            Self::DataCorruption => "data_corruption",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected anomaly, consumed exactly once by the fault dispatcher.
///
/// Reports are immutable once built; fields are only reachable through
/// accessors.  Deserialized reports go through [`FaultReport::new`], so the
/// confidence clamp always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "FaultReportFields")]
pub struct FaultReport {
    kind: FaultKind,
    confidence: f32,
    timestamp_ms: u64,
}

#[derive(Deserialize)]
struct FaultReportFields {
    kind: FaultKind,
    confidence: f32,
    timestamp_ms: u64,
}

impl From<FaultReportFields> for FaultReport {
    fn from(raw: FaultReportFields) -> Self {
        Self::new(raw.kind, raw.confidence, raw.timestamp_ms)
    }
}

impl FaultReport {
    /// Build a report. `confidence` is clamped into `[0, 1]`; NaN becomes 0.
    pub fn new(kind: FaultKind, confidence: f32, timestamp_ms: u64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            kind,
            confidence,
            timestamp_ms,
        }
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Monotonic tick (milliseconds since boot) at which the fault was seen.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

/// Operating mode of the watchdog module.
///
/// The ordinal is transmitted in byte 1 of every telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum SystemMode {
    #[default]
    Boot = 0,
    Normal = 1,
    MlActive = 2,
    DataCollection = 3,
    Warning = 4,
    ObcDegradation = 5,
    ObcFault = 6,
    TtcFault = 7,
    Critical = 8,
    Demo = 9,
    ResetPending = 10,
}

impl SystemMode {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Boot),
            1 => Some(Self::Normal),
            2 => Some(Self::MlActive),
            3 => Some(Self::DataCollection),
            4 => Some(Self::Warning),
            5 => Some(Self::ObcDegradation),
            6 => Some(Self::ObcFault),
            7 => Some(Self::TtcFault),
            8 => Some(Self::Critical),
            9 => Some(Self::Demo),
            10 => Some(Self::ResetPending),
            _ => None,
        }
    }

    /// The mode entered when a fault of `kind` is being mitigated.
    pub fn for_fault(kind: FaultKind) -> Option<Self> {
        match kind {
            FaultKind::None => None,
            FaultKind::NoHeartbeat => Some(Self::ObcFault),
            FaultKind::Overcurrent => Some(Self::Warning),
            FaultKind::TtcTimeout => Some(Self::TtcFault),
            FaultKind::DataCorruption => Some(Self::Warning),
        }
    }

    /// `ResetPending` is terminal until the hardware reset restarts the process.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ResetPending)
    }

    /// Colour shown on the addressable RGB indicator while in this mode.
    pub fn color(self) -> Rgb {
        match self {
            Self::Boot => Rgb::WHITE,
            Self::Normal => Rgb::GREEN,
            Self::MlActive => Rgb::BLUE,
            Self::DataCollection => Rgb::CYAN,
            Self::Warning => Rgb::YELLOW,
            Self::ObcDegradation => Rgb::ORANGE,
            Self::ObcFault => Rgb::RED,
            Self::TtcFault => Rgb::PURPLE,
            Self::Critical => Rgb::RED,
            Self::Demo => Rgb::BLUE,
            Self::ResetPending => Rgb::ORANGE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Normal => "normal",
            Self::MlActive => "ml_active",
            Self::DataCollection => "data_collection",
            Self::Warning => "warning",
            Self::ObcDegradation => "obc_degradation",
            Self::ObcFault => "obc_fault",
            Self::TtcFault => "ttc_fault",
            Self::Critical => "critical",
            Self::Demo => "demo",
            Self::ResetPending => "reset_pending",
        }
    }
}

impl std::fmt::Display for SystemMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs of the reset OR-gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResetSourceKind {
    /// The external hardware watchdog timed out (or was deliberately starved).
    Watchdog,
    /// The power supervisor flagged a brown-out.
    PowerSupervisor,
    /// Software asked for a reset.
    Software,
    /// The manual reset button was pressed.
    Manual,
}

impl ResetSourceKind {
    pub const ALL: [Self; 4] = [
        Self::Watchdog,
        Self::PowerSupervisor,
        Self::Software,
        Self::Manual,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Watchdog => "watchdog",
            Self::PowerSupervisor => "power_supervisor",
            Self::Software => "software",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for ResetSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete status indicators driven by the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorId {
    MlActive,
    FaultObc,
    FaultTtc,
    Warning,
    Heartbeat,
    CommActive,
    SysOk,
}

impl IndicatorId {
    pub const ALL: [Self; 7] = [
        Self::MlActive,
        Self::FaultObc,
        Self::FaultTtc,
        Self::Warning,
        Self::Heartbeat,
        Self::CommActive,
        Self::SysOk,
    ];
}

/// 24-bit colour for the addressable RGB indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const GREEN: Self = Self::new(0, 255, 0);
    pub const BLUE: Self = Self::new(0, 0, 255);
    pub const YELLOW: Self = Self::new(255, 255, 0);
    pub const RED: Self = Self::new(255, 0, 0);
    pub const PURPLE: Self = Self::new(128, 0, 128);
    pub const CYAN: Self = Self::new(0, 255, 255);
    pub const ORANGE: Self = Self::new(255, 165, 0);
}

/// Fixed-layout 32-byte telemetry frame sent over the TTC downlink.
///
/// | Byte | Content |
/// |---|---|
/// | 0 | sync, always `0xAA` |
/// | 1 | [`SystemMode`] ordinal |
/// | 2 | reset-latched flag (`0` or `1`) |
/// | 3..32 | reserved, zero |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub mode: SystemMode,
    pub reset_latched: bool,
}

impl TelemetryFrame {
    pub const LEN: usize = 32;
    pub const SYNC: u8 = 0xAA;

    pub fn new(mode: SystemMode, reset_latched: bool) -> Self {
        Self {
            mode,
            reset_latched,
        }
    }

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut frame = [0u8; Self::LEN];
        frame[0] = Self::SYNC;
        frame[1] = self.mode.ordinal();
        frame[2] = u8::from(self.reset_latched);
        frame
    }

    /// Parse a frame received on the ground side or in a simulator.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Frame`] on a wrong length, a missing sync
    /// byte, or an unknown mode ordinal.
    pub fn parse(bytes: &[u8]) -> Result<Self, SentinelError> {
        let [sync, mode, latched, ..] = bytes else {
            return Err(SentinelError::Frame(format!(
                "telemetry frame too short: {} bytes",
                bytes.len()
            )));
        };
        if bytes.len() != Self::LEN {
            return Err(SentinelError::Frame(format!(
                "telemetry frame must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        if *sync != Self::SYNC {
            return Err(SentinelError::Frame(format!("bad sync byte {sync:#04x}")));
        }
        let mode = SystemMode::from_ordinal(*mode)
            .ok_or_else(|| SentinelError::Frame(format!("unknown mode ordinal {mode}")))?;
        Ok(Self {
            mode,
            reset_latched: *latched != 0,
        })
    }
}

/// Command frame asking the ground station to retransmit the last block.
pub const RETRANSMIT_REQUEST: [u8; 4] = [0x55, 0xAA, 0x01, 0x00];

/// Workspace-wide error type spanning hardware lines, the serial transport,
/// the inference engine, sensors, configuration and frame parsing.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SentinelError {
    #[error("Line Fault on {line}: {details}")]
    LineFault { line: String, details: String },

    #[error("Serial Transport Error: {0}")]
    Transport(String),

    #[error("Inference Engine Unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Inference Failed: {0}")]
    Inference(String),

    #[error("Sensor Read Failed: {0}")]
    Sensor(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Malformed Frame: {0}")]
    Frame(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_kind_class_mapping_is_stable() {
        for index in 0..FaultKind::COUNT {
            let kind = FaultKind::from_class(index).unwrap();
            assert_eq!(kind.class(), index);
        }
        assert_eq!(FaultKind::from_class(FaultKind::COUNT), None);
        assert!(!FaultKind::None.is_fault());
        assert!(FaultKind::DataCorruption.is_fault());
    }

    #[test]
    fn fault_report_clamps_confidence() {
        let report = FaultReport::new(FaultKind::Overcurrent, 1.7, 42);
        assert!((report.confidence() - 1.0).abs() < f32::EPSILON);
        let report = FaultReport::new(FaultKind::Overcurrent, f32::NAN, 42);
        assert!(report.confidence().abs() < f32::EPSILON);
        assert_eq!(report.timestamp_ms(), 42);
    }

    #[test]
    fn system_mode_ordinals_match_wire_values() {
        assert_eq!(SystemMode::Boot.ordinal(), 0);
        assert_eq!(SystemMode::Normal.ordinal(), 1);
        assert_eq!(SystemMode::ObcFault.ordinal(), 6);
        assert_eq!(SystemMode::ResetPending.ordinal(), 10);
        assert_eq!(SystemMode::from_ordinal(11), None);
        assert!(SystemMode::ResetPending.is_terminal());
        assert!(!SystemMode::Critical.is_terminal());
    }

    #[test]
    fn fault_modes() {
        assert_eq!(SystemMode::for_fault(FaultKind::None), None);
        assert_eq!(
            SystemMode::for_fault(FaultKind::NoHeartbeat),
            Some(SystemMode::ObcFault)
        );
        assert_eq!(
            SystemMode::for_fault(FaultKind::TtcTimeout),
            Some(SystemMode::TtcFault)
        );
    }

    #[test]
    fn telemetry_frame_layout() {
        let bytes = TelemetryFrame::new(SystemMode::TtcFault, true).encode();
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[0], 0xAA);
        assert_eq!(bytes[1], 7);
        assert_eq!(bytes[2], 1);
        assert!(bytes[3..].iter().all(|b| *b == 0));

        let parsed = TelemetryFrame::parse(&bytes).unwrap();
        assert_eq!(parsed.mode, SystemMode::TtcFault);
        assert!(parsed.reset_latched);
    }

    #[test]
    fn telemetry_frame_rejects_garbage() {
        assert!(TelemetryFrame::parse(&[0xAA, 1]).is_err());
        assert!(TelemetryFrame::parse(&[0xAA; 16]).is_err());

        let mut bytes = TelemetryFrame::new(SystemMode::Normal, false).encode();
        bytes[0] = 0x55;
        assert!(TelemetryFrame::parse(&bytes).is_err());

        bytes[0] = 0xAA;
        bytes[1] = 200;
        assert!(TelemetryFrame::parse(&bytes).is_err());
    }

    #[test]
    fn fault_report_serializes_as_json() {
        let report = FaultReport::new(FaultKind::TtcTimeout, 0.9, 2100);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("TtcTimeout"));
        let back: FaultReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn deserialized_report_confidence_is_clamped() {
        let json = r#"{"kind":"Overcurrent","confidence":3.5,"timestamp_ms":40}"#;
        let report: FaultReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.confidence(), 1.0);
        assert_eq!(report.kind(), FaultKind::Overcurrent);
        assert_eq!(report.timestamp_ms(), 40);
    }

    #[test]
    fn sentinel_error_display() {
        let err = SentinelError::LineFault {
            line: "reset_out".to_string(),
            details: "stuck low".to_string(),
        };
        assert!(err.to_string().contains("reset_out"));
        assert!(
            SentinelError::EngineUnavailable("not initialised".into())
                .to_string()
                .contains("Unavailable")
        );
    }
}
