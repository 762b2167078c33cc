//! [`Sentinel`] – wires a [`Board`] to the shared state cells and spawns one
//! task per component.
//!
//! # Boot sequence
//!
//! 1. Mode is `Boot`.
//! 2. Every output goes to its safe level: signal lines low, power switches
//!    high.
//! 3. The SysOk indicator lights and the status colour turns green.
//! 4. Mode moves to `Normal` and the tasks are spawned, highest priority
//!    first.
//!
//! All monitors start in the "healthy, just seen" state so nothing faults
//! during boot.
//!
//! # Scheduling
//!
//! Every task shares the caller's tokio runtime, which schedules without
//! priorities or preemption.  [`TaskPriority`] fixes spawn order and tags
//! each task's span; it does not guarantee that the dispatcher runs ahead
//! of a busy monitor.  Dispatch latency is bounded only because every task
//! body is short and yields at each await.
//!
//! # Example
//!
//! ```rust,no_run
//! use sentinel_hal::sim::SimBoard;
//! use sentinel_runtime::Sentinel;
//!
//! # async fn demo() {
//! let (board, _sim) = SimBoard::new().build();
//! let handle = Sentinel::new(board).start();
//! handle.request_software_reset();
//! # }
//! ```

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use sentinel_hal::{Board, InputLine};
use sentinel_kernel::{
    HeartbeatCell, HeartbeatSnapshot, LineSource, LinkCell, ModeCell, MonotonicClock,
    NeverAsserted, PingHealth, ResetArbiter, ResetSnapshot, ResetSource, ResetSources,
    WatchdogState,
};
use sentinel_middleware::{FaultSender, ModeBus, ModeSubscriber, PushOutcome, fault_channel};
use sentinel_types::{FaultReport, IndicatorId, ResetSourceKind, Rgb, SystemMode};
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span, warn};

use crate::classifier_driver::ClassifierDriver;
use crate::dispatcher::{DispatchLines, FaultDispatcher};
use crate::heartbeat_monitor::{HeartbeatBeacon, HeartbeatMonitor};
use crate::indicators::IndicatorRefresh;
use crate::link_monitor::LinkMonitor;
use crate::reset_arbitrator::ResetArbitrator;
use crate::watchdog_keeper::WatchdogKeeper;

/// Scheduling priority of a task, highest first.  Advisory only; see the
/// module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskPriority {
    Dispatch,
    Safety,
    Monitor,
    Indication,
}

/// Identity of a spawned component task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    FaultDispatcher,
    ResetArbitrator,
    WatchdogKeeper,
    HeartbeatMonitor,
    HeartbeatBeacon,
    ClassifierDriver,
    LinkMonitor,
    IndicatorRefresh,
}

impl TaskKind {
    pub fn priority(self) -> TaskPriority {
        match self {
            Self::FaultDispatcher => TaskPriority::Dispatch,
            Self::ResetArbitrator | Self::WatchdogKeeper => TaskPriority::Safety,
            Self::HeartbeatMonitor
            | Self::HeartbeatBeacon
            | Self::ClassifierDriver
            | Self::LinkMonitor => TaskPriority::Monitor,
            Self::IndicatorRefresh => TaskPriority::Indication,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FaultDispatcher => "fault_dispatcher",
            Self::ResetArbitrator => "reset_arbitrator",
            Self::WatchdogKeeper => "watchdog_keeper",
            Self::HeartbeatMonitor => "heartbeat_monitor",
            Self::HeartbeatBeacon => "heartbeat_beacon",
            Self::ClassifierDriver => "classifier_driver",
            Self::LinkMonitor => "link_monitor",
            Self::IndicatorRefresh => "indicator_refresh",
        }
    }
}

/// The shared state cells, one `Arc` each.
#[derive(Clone)]
pub struct SharedState {
    pub clock: MonotonicClock,
    pub mode: Arc<ModeCell>,
    pub reset: Arc<ResetSources>,
    pub heartbeat: Arc<HeartbeatCell>,
    pub link: Arc<LinkCell>,
    pub watchdog: Arc<WatchdogState>,
}

impl SharedState {
    fn new(bus: ModeBus) -> Self {
        let clock = MonotonicClock::start();
        let now_ms = clock.now_ms();
        Self {
            clock,
            mode: Arc::new(ModeCell::new(bus)),
            reset: Arc::new(ResetSources::new()),
            heartbeat: Arc::new(HeartbeatCell::new(now_ms)),
            link: Arc::new(LinkCell::new(now_ms)),
            watchdog: Arc::new(WatchdogState::new()),
        }
    }
}

/// System builder.  Consumed by [`start`][Sentinel::start].
pub struct Sentinel {
    board: Board,
    bus: ModeBus,
}

impl Sentinel {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            bus: ModeBus::default(),
        }
    }

    /// Subscribe to mode changes before the system starts, so the boot
    /// transition is observed too.
    pub fn subscribe_modes(&self) -> ModeSubscriber {
        self.bus.subscribe()
    }

    /// Run the boot sequence and spawn every task.  Must be called from
    /// within a Tokio runtime.
    pub fn start(self) -> SentinelHandle {
        let Self { board, bus } = self;
        let shared = SharedState::new(bus);
        let clock = shared.clock;

        if let Err(e) = board.apply_safe_state() {
            warn!(error = %e, "boot: safe state not fully applied");
        }
        board.indicators.set_indicator(IndicatorId::SysOk, true);
        board.indicators.set_color(Rgb::GREEN);
        shared.mode.transition(SystemMode::Normal, clock.now_ms());
        info!(tick_ms = clock.now_ms(), "boot complete");

        let (fault_tx, fault_rx) = fault_channel();
        let mut tasks = Vec::new();
        let mut spawn = |kind: TaskKind, task: BoxFuture<'static, ()>| {
            let span = info_span!("task", name = kind.as_str(), priority = ?kind.priority());
            tasks.push((kind, tokio::spawn(task.instrument(span))));
        };

        let dispatcher = FaultDispatcher::new(
            fault_rx,
            DispatchLines {
                fault_active: board.fault_active.clone(),
                reset_request: board.reset_request.clone(),
                power_switches: board.power_switches.clone(),
            },
            board.serial.clone(),
            board.indicators.clone(),
            shared.mode.clone(),
            shared.link.clone(),
            clock,
        );
        spawn(TaskKind::FaultDispatcher, dispatcher.run().boxed());

        let line_sources = vec![
            line_source(ResetSourceKind::PowerSupervisor, &board.power_supervisor),
            line_source(ResetSourceKind::Manual, &board.manual_reset),
        ];
        let arbitrator = ResetArbitrator::new(
            ResetArbiter::new(shared.reset.clone(), line_sources),
            shared.mode.clone(),
            board.fault_active.clone(),
            board.reset_out.clone(),
            board.indicators.clone(),
            clock,
        );
        spawn(TaskKind::ResetArbitrator, arbitrator.run().boxed());

        let keeper = WatchdogKeeper::new(
            board.wdog_wake.clone(),
            board.wdog_done.clone(),
            shared.watchdog.clone(),
            shared.reset.clone(),
            clock,
        );
        spawn(TaskKind::WatchdogKeeper, keeper.run().boxed());

        let heartbeat = HeartbeatMonitor::new(
            board.heartbeat_in.clone(),
            shared.heartbeat.clone(),
            fault_tx.clone(),
            board.indicators.clone(),
            clock,
        );
        spawn(TaskKind::HeartbeatMonitor, heartbeat.run().boxed());
        spawn(
            TaskKind::HeartbeatBeacon,
            HeartbeatBeacon::new(board.heartbeat_out.clone()).run().boxed(),
        );

        let classifier = ClassifierDriver::new(
            board.engine,
            board.sensors.clone(),
            shared.heartbeat.clone(),
            shared.link.clone(),
            fault_tx.clone(),
            board.indicators.clone(),
            clock,
        );
        spawn(TaskKind::ClassifierDriver, classifier.run().boxed());

        let link = LinkMonitor::new(
            board.serial.clone(),
            shared.link.clone(),
            shared.mode.clone(),
            shared.reset.clone(),
            fault_tx.clone(),
            board.indicators.clone(),
            clock,
        );
        spawn(TaskKind::LinkMonitor, link.run().boxed());

        let refresh = IndicatorRefresh::new(shared.mode.bus().subscribe(), board.indicators.clone());
        spawn(TaskKind::IndicatorRefresh, refresh.run().boxed());

        SentinelHandle {
            shared,
            faults: fault_tx,
            tasks,
        }
    }
}

/// A line-backed reset source, or a stub when the board has no such line.
fn line_source(kind: ResetSourceKind, line: &Option<Arc<dyn InputLine>>) -> Box<dyn ResetSource> {
    match line {
        Some(line) => Box::new(LineSource::new(kind, line.clone())),
        None => Box::new(NeverAsserted(kind)),
    }
}

/// Handle onto a running system.  Dropping it aborts every task.
pub struct SentinelHandle {
    shared: SharedState,
    faults: FaultSender,
    tasks: Vec<(TaskKind, JoinHandle<()>)>,
}

impl SentinelHandle {
    pub fn mode(&self) -> SystemMode {
        self.shared.mode.get()
    }

    pub fn subscribe_modes(&self) -> ModeSubscriber {
        self.shared.mode.bus().subscribe()
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    /// Assert the software reset source.  The arbitrator acts on it within
    /// one cycle.
    pub fn request_software_reset(&self) {
        warn!(tick_ms = self.shared.clock.now_ms(), "software reset requested");
        self.shared.reset.assert(ResetSourceKind::Software);
    }

    /// Starve the external watchdog and assert the watchdog reset source.
    pub fn trigger_watchdog_reset(&self) {
        self.shared.watchdog.trigger_reset(&self.shared.reset);
    }

    /// Submit a report from outside the monitors (e.g. a ground command).
    pub fn report_fault(&self, report: FaultReport) -> PushOutcome {
        self.faults.try_push(report)
    }

    pub fn reset_state(&self) -> ResetSnapshot {
        self.shared.reset.snapshot()
    }

    pub fn heartbeat(&self) -> HeartbeatSnapshot {
        self.shared.heartbeat.snapshot()
    }

    pub fn link_healthy(&self) -> bool {
        self.shared.link.is_healthy()
    }

    pub fn time_since_last_ping(&self) -> Option<u64> {
        self.shared
            .watchdog
            .time_since_last_ping(self.shared.clock.now_ms())
    }

    pub fn watchdog_health(&self) -> PingHealth {
        self.shared.watchdog.health(self.shared.clock.now_ms())
    }

    pub fn faults_dropped(&self) -> u64 {
        self.faults.dropped_count()
    }

    /// Spawned tasks in spawn order.
    pub fn tasks(&self) -> impl Iterator<Item = TaskKind> + '_ {
        self.tasks.iter().map(|(kind, _)| *kind)
    }

    /// `true` while every task is still running.
    pub fn all_running(&self) -> bool {
        self.tasks.iter().all(|(_, handle)| !handle.is_finished())
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for SentinelHandle {
    fn drop(&mut self) {
        for (_, handle) in &self.tasks {
            handle.abort();
        }
    }
}
