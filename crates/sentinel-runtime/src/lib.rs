//! `sentinel-runtime` – The Task Layer
//!
//! One async task per watchdog component, plus the [`Sentinel`] builder
//! that wires them to a [`Board`][sentinel_hal::Board] and the shared state
//! cells.  There is no central loop: every component runs on its own
//! absolute-deadline cadence and they meet only through the fault channel
//! and the state cells.
//!
//! # Modules
//!
//! - [`system`] – [`Sentinel`] / [`SentinelHandle`]: boot sequence, task
//!   spawning, and the external control surface (software reset request,
//!   watchdog starvation, fault injection, status queries).
//! - [`dispatcher`] – [`FaultDispatcher`]: sole consumer of the fault
//!   channel; mitigates one fault at a time.
//! - [`reset_arbitrator`] – [`ResetArbitrator`]: OR of reset sources,
//!   one-shot latch, controlled shutdown and the hardware reset pulse.
//! - [`watchdog_keeper`] – [`WatchdogKeeper`]: external watchdog keep-alive
//!   and timed-out sampling.
//! - [`heartbeat_monitor`] – [`HeartbeatMonitor`] and the 1 Hz
//!   [`HeartbeatBeacon`].
//! - [`classifier_driver`] – [`ClassifierDriver`]: feature collection,
//!   inference, thresholding.
//! - [`link_monitor`] – [`LinkMonitor`]: TTC recency, timeout and telemetry.
//! - [`indicators`] – [`IndicatorRefresh`]: status colour follows the mode.
//! - [`telemetry`] – [`init_tracing`]: `tracing` subscriber with optional
//!   OTLP export.

pub mod classifier_driver;
pub mod dispatcher;
pub mod heartbeat_monitor;
pub mod indicators;
pub mod link_monitor;
pub mod reset_arbitrator;
pub mod system;
pub mod telemetry;
pub mod watchdog_keeper;

pub use classifier_driver::ClassifierDriver;
pub use dispatcher::{DispatchLines, FaultDispatcher};
pub use heartbeat_monitor::{HeartbeatBeacon, HeartbeatMonitor};
pub use indicators::IndicatorRefresh;
pub use link_monitor::LinkMonitor;
pub use reset_arbitrator::ResetArbitrator;
pub use system::{Sentinel, SentinelHandle, SharedState, TaskKind, TaskPriority};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use watchdog_keeper::WatchdogKeeper;
