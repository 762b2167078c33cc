//! `sentinel-kernel` – Fault Policy & Shared State
//!
//! The decision-making core of the watchdog module.  Nothing in here drives
//! hardware or spawns tasks; the runtime feeds samples in and acts on the
//! verdicts.
//!
//! # Modules
//!
//! - [`policy`] – fixed cadences, timeouts, thresholds and hold durations.
//! - [`clock`] – [`MonotonicClock`]: millisecond ticks since boot.
//! - [`cadence`] – [`Cadence`]: absolute-deadline periodic wake-ups.
//! - [`state`] – the shared state cells: [`ResetSources`], [`ModeCell`],
//!   [`HeartbeatCell`], [`LinkCell`].
//! - [`heartbeat`] – [`HeartbeatTracker`]: pulse validation and edge-triggered
//!   loss detection.
//! - [`link`] – [`LinkTracker`]: level-triggered TTC timeout and telemetry
//!   cadence.
//! - [`classifier`] – [`classify`] and [`FeatureVector`]: engine input and
//!   output policy.
//! - [`reset`] – [`ResetArbiter`]: source predicates, OR gate and one-shot
//!   latch.
//! - [`watchdog`] – [`WatchdogState`]: external watchdog keep-alive
//!   bookkeeping and the starvation escape hatch.

pub mod cadence;
pub mod classifier;
pub mod clock;
pub mod heartbeat;
pub mod link;
pub mod policy;
pub mod reset;
pub mod state;
pub mod watchdog;

pub use cadence::Cadence;
pub use classifier::{Classification, FeatureVector, StateFeatures, classify};
pub use clock::MonotonicClock;
pub use heartbeat::{EdgeVerdict, HeartbeatSample, HeartbeatTracker};
pub use link::{LinkCycle, LinkTracker};
pub use reset::{Arbitration, LineSource, NeverAsserted, ResetArbiter, ResetSource};
pub use state::{
    HeartbeatCell, HeartbeatSnapshot, LinkCell, ModeCell, ResetSnapshot, ResetSources, Transition,
};
pub use watchdog::{PingHealth, WatchdogState};
