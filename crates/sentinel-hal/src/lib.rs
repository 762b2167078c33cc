//! `sentinel-hal` – Hardware Abstraction Layer
//!
//! Capability traits for everything the watchdog touches on the board, plus
//! a fully simulated implementation for tests and the demo binary.
//!
//! # Modules
//!
//! - [`line`] – [`OutputLine`] / [`InputLine`]: discrete digital lines.
//! - [`serial`] – [`SerialTransport`]: the TTC link (send, restart, receive
//!   stream).
//! - [`inference`] – [`InferenceEngine`]: the opaque anomaly classifier.
//! - [`sensors`] – [`SensorProvider`]: analog and system-load readings.
//! - [`indicator`] – [`IndicatorSink`]: discrete indicators and the RGB
//!   status light.
//! - [`registry`] – [`Board`]: the bundle of handles wired into the runtime.
//! - [`sim`] – simulated drivers and the [`SimBoard`][sim::SimBoard] builder.

pub mod indicator;
pub mod inference;
pub mod line;
pub mod registry;
pub mod sensors;
pub mod serial;
pub mod sim;

pub use indicator::IndicatorSink;
pub use inference::{CLASS_COUNT, FEATURE_WIDTH, InferenceEngine};
pub use line::{InputLine, OutputLine};
pub use registry::{Board, set_all};
pub use sensors::SensorProvider;
pub use serial::{REINIT_SETTLE, RxEvent, SerialTransport};
