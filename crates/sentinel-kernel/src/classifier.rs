//! Anomaly classification policy.
//!
//! [`FeatureVector`] assembles the engine input from sensor and state
//! readings; [`classify`] turns the engine's class scores into a decision.
//! Both the feature layout and the thresholding rule are fixed policy.

use sentinel_hal::{CLASS_COUNT, FEATURE_WIDTH, SensorProvider};
use sentinel_types::{FaultKind, FaultReport, SentinelError};

use crate::policy::CLASSIFIER_THRESHOLD;

/// Winning class of one inference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub class: usize,
    pub confidence: f32,
}

impl Classification {
    pub fn kind(&self) -> FaultKind {
        FaultKind::from_class(self.class).unwrap_or(FaultKind::None)
    }

    /// A report when the winner is a fault class with confidence strictly
    /// above [`CLASSIFIER_THRESHOLD`].
    pub fn to_report(&self, now_ms: u64) -> Option<FaultReport> {
        let kind = self.kind();
        (kind.is_fault() && self.confidence > CLASSIFIER_THRESHOLD)
            .then(|| FaultReport::new(kind, self.confidence, now_ms))
    }
}

/// Stable argmax: seeded with class 0 at confidence 0.0, a later class wins
/// only with a strictly greater score.  Ties go to the lowest index; NaN
/// scores never win.
pub fn classify(scores: &[f32; CLASS_COUNT]) -> Classification {
    let mut best = Classification {
        class: 0,
        confidence: 0.0,
    };
    for (class, &score) in scores.iter().enumerate() {
        if score > best.confidence {
            best = Classification {
                class,
                confidence: score,
            };
        }
    }
    best
}

/// Non-sensor inputs to the feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateFeatures {
    pub heartbeat_period_ms: u32,
    pub heartbeat_healthy: bool,
    pub link_healthy: bool,
    pub tick_ms: u64,
}

/// The engine input.
///
/// | Index | Feature |
/// |---|---|
/// | 0 | 3.3 V rail (V) |
/// | 1 | 5 V rail (V) |
/// | 2 | internal reference (V) |
/// | 3 | temperature (°C) |
/// | 4 | current (A) |
/// | 5 | heartbeat period (s) |
/// | 6 | heartbeat healthy (0/1) |
/// | 7 | CPU usage (fraction) |
/// | 8 | memory usage (fraction) |
/// | 9 | time-of-day modulus, `(tick % 10000) / 10000` |
/// | 10 | TTC link healthy (0/1) |
/// | 11.. | zero |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; FEATURE_WIDTH]);

impl FeatureVector {
    /// Read every sensor and assemble the vector.
    ///
    /// # Errors
    ///
    /// Propagates the first sensor failure; the caller skips the cycle.
    pub fn collect(
        sensors: &dyn SensorProvider,
        state: StateFeatures,
    ) -> Result<Self, SentinelError> {
        let mut features = [0.0f32; FEATURE_WIDTH];
        features[0] = sensors.voltage_3v3()?;
        features[1] = sensors.voltage_5v()?;
        features[2] = sensors.internal_vref()?;
        features[3] = sensors.temperature()?;
        features[4] = sensors.current()?;
        features[5] = state.heartbeat_period_ms as f32 / 1000.0;
        features[6] = flag(state.heartbeat_healthy);
        features[7] = sensors.cpu_usage()? / 100.0;
        features[8] = sensors.mem_usage()? / 100.0;
        features[9] = (state.tick_ms % 10_000) as f32 / 10_000.0;
        features[10] = flag(state.link_healthy);
        Ok(Self(features))
    }

    pub fn as_array(&self) -> &[f32; FEATURE_WIDTH] {
        &self.0
    }
}

fn flag(value: bool) -> f32 {
    if value { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_hal::sim::{SensorReadings, SimSensors};

    #[test]
    fn argmax_picks_highest_score() {
        let c = classify(&[0.1, 0.9, 0.2, 0.0, 0.0]);
        assert_eq!(c.class, 1);
        assert!((c.confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(c.kind(), FaultKind::NoHeartbeat);
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        let c = classify(&[0.1, 0.4, 0.4, 0.4, 0.0]);
        assert_eq!(c.class, 1);
        let c = classify(&[0.5, 0.5, 0.0, 0.0, 0.0]);
        assert_eq!(c.class, 0);
    }

    #[test]
    fn all_zero_scores_are_class_none() {
        let c = classify(&[0.0; CLASS_COUNT]);
        assert_eq!(c.class, 0);
        assert_eq!(c.to_report(0), None);
    }

    #[test]
    fn threshold_is_strict() {
        let at = Classification {
            class: 2,
            confidence: CLASSIFIER_THRESHOLD,
        };
        assert_eq!(at.to_report(0), None);

        let above = classify(&[0.0, 0.0, 0.71, 0.0, 0.0]);
        let report = above.to_report(1234).unwrap();
        assert_eq!(report.kind(), FaultKind::Overcurrent);
        assert_eq!(report.timestamp_ms(), 1234);
    }

    #[test]
    fn confident_none_is_not_reported() {
        assert_eq!(classify(&[0.99, 0.0, 0.0, 0.0, 0.0]).to_report(0), None);
    }

    #[test]
    fn feature_layout_matches_table() {
        let sensors = SimSensors::new();
        sensors.set(SensorReadings {
            temperature: 40.0,
            voltage_3v3: 3.25,
            voltage_5v: 4.9,
            internal_vref: 1.21,
            current: 0.5,
            cpu_usage: 50.0,
            mem_usage: 25.0,
        });
        let v = FeatureVector::collect(
            sensors.as_ref(),
            StateFeatures {
                heartbeat_period_ms: 1000,
                heartbeat_healthy: true,
                link_healthy: false,
                tick_ms: 12_500,
            },
        )
        .unwrap();
        let f = v.as_array();
        assert_eq!(
            &f[..11],
            &[3.25, 4.9, 1.21, 40.0, 0.5, 1.0, 1.0, 0.5, 0.25, 0.25, 0.0]
        );
        assert!(f[11..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn sensor_failure_propagates() {
        let sensors = SimSensors::new();
        sensors.fail_reads(true);
        let state = StateFeatures {
            heartbeat_period_ms: 0,
            heartbeat_healthy: true,
            link_healthy: true,
            tick_ms: 0,
        };
        assert!(FeatureVector::collect(sensors.as_ref(), state).is_err());
    }
}
