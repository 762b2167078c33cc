//! The opaque anomaly-classification engine.
//!
//! The engine consumes a fixed-width feature vector and produces one score
//! per [`FaultKind`][sentinel_types::FaultKind].  Its internals (weights,
//! arithmetic, quantisation) are none of the watchdog's business.

use sentinel_types::{FaultKind, SentinelError};

/// Number of input features the engine expects.
pub const FEATURE_WIDTH: usize = 32;

/// Number of class scores the engine produces.
pub const CLASS_COUNT: usize = FaultKind::COUNT;

/// An inference engine.  Owned exclusively by the classifier task.
pub trait InferenceEngine: Send {
    /// Load the model and allocate buffers.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::EngineUnavailable`] if the engine cannot be
    /// brought up.
    fn init(&mut self) -> Result<(), SentinelError>;

    /// Score one feature vector.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::EngineUnavailable`] when called before a
    /// successful [`init`][Self::init], or [`SentinelError::Inference`] when
    /// the run itself fails.
    fn infer(
        &mut self,
        features: &[f32; FEATURE_WIDTH],
    ) -> Result<[f32; CLASS_COUNT], SentinelError>;
}
