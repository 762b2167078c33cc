//! Anomaly classifier driver.
//!
//! Every 100 ms: collect the feature vector, run the inference engine,
//! threshold the result.  Any failure along the way skips the cycle without
//! reporting anything; an engine that failed to initialise is retried on the
//! next cycle.

use std::sync::Arc;

use sentinel_hal::{IndicatorSink, InferenceEngine, SensorProvider};
use sentinel_kernel::policy::CLASSIFIER_PERIOD;
use sentinel_kernel::{
    Cadence, FeatureVector, HeartbeatCell, LinkCell, MonotonicClock, StateFeatures, classify,
};
use sentinel_middleware::FaultSender;
use sentinel_types::{IndicatorId, SentinelError};
use tracing::{debug, info, trace, warn};

pub struct ClassifierDriver {
    engine: Box<dyn InferenceEngine>,
    sensors: Arc<dyn SensorProvider>,
    heartbeat: Arc<HeartbeatCell>,
    link: Arc<LinkCell>,
    faults: FaultSender,
    indicators: Arc<dyn IndicatorSink>,
    clock: MonotonicClock,
    engine_ready: bool,
}

impl ClassifierDriver {
    pub fn new(
        engine: Box<dyn InferenceEngine>,
        sensors: Arc<dyn SensorProvider>,
        heartbeat: Arc<HeartbeatCell>,
        link: Arc<LinkCell>,
        faults: FaultSender,
        indicators: Arc<dyn IndicatorSink>,
        clock: MonotonicClock,
    ) -> Self {
        Self {
            engine,
            sensors,
            heartbeat,
            link,
            faults,
            indicators,
            clock,
            engine_ready: false,
        }
    }

    pub fn is_engine_ready(&self) -> bool {
        self.engine_ready
    }

    fn set_ready(&mut self, ready: bool) {
        if self.engine_ready != ready {
            self.engine_ready = ready;
            self.indicators.set_indicator(IndicatorId::MlActive, ready);
        }
    }

    pub fn cycle(&mut self, now_ms: u64) {
        if !self.engine_ready {
            match self.engine.init() {
                Ok(()) => {
                    info!(tick_ms = now_ms, "inference engine initialised");
                    self.set_ready(true);
                }
                Err(e) => {
                    debug!(error = %e, "inference engine unavailable; retrying next cycle");
                    return;
                }
            }
        }

        let heartbeat = self.heartbeat.snapshot();
        let state = StateFeatures {
            heartbeat_period_ms: heartbeat.measured_period_ms,
            heartbeat_healthy: heartbeat.healthy,
            link_healthy: self.link.is_healthy(),
            tick_ms: now_ms,
        };
        let features = match FeatureVector::collect(self.sensors.as_ref(), state) {
            Ok(features) => features,
            Err(e) => {
                debug!(error = %e, "sensor read failed; skipping cycle");
                return;
            }
        };

        let scores = match self.engine.infer(features.as_array()) {
            Ok(scores) => scores,
            Err(SentinelError::EngineUnavailable(reason)) => {
                warn!(reason = %reason, "inference engine dropped out");
                self.set_ready(false);
                return;
            }
            Err(e) => {
                debug!(error = %e, "inference failed; skipping cycle");
                return;
            }
        };

        let classification = classify(&scores);
        trace!(
            class = classification.class,
            confidence = classification.confidence,
            "classified"
        );
        if let Some(report) = classification.to_report(now_ms) {
            warn!(
                kind = %report.kind(),
                confidence = report.confidence(),
                tick_ms = now_ms,
                "anomaly detected"
            );
            self.faults.try_push(report);
        }
    }

    pub async fn run(mut self) {
        let mut cadence = Cadence::new(CLASSIFIER_PERIOD);
        loop {
            let deadline = cadence.tick().await;
            self.cycle(self.clock.ms_at(deadline));
        }
    }
}
