//! In-process simulated hardware for tests and the demo binary.
//!
//! [`SimBoard`] builds a [`Board`] whose every slot is backed by a stub
//! driver that records what it was asked to do, and hands back a
//! [`SimHandles`] bundle so the caller can stimulate inputs and inspect
//! outputs.  Line transitions are stamped with [`tokio::time::Instant`], so
//! tests running on paused virtual time can assert exact pulse widths.
//!
//! # Example
//!
//! ```rust
//! use sentinel_hal::sim::SimBoard;
//! use sentinel_hal::line::OutputLine;
//!
//! let (board, sim) = SimBoard::new().build();
//! board.fault_active.set(true).unwrap();
//! assert!(sim.fault_active.is_high());
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use sentinel_types::{IndicatorId, Rgb, SentinelError, TelemetryFrame};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::indicator::IndicatorSink;
use crate::inference::{CLASS_COUNT, FEATURE_WIDTH, InferenceEngine};
use crate::line::{InputLine, OutputLine};
use crate::registry::Board;
use crate::sensors::SensorProvider;
use crate::serial::{REINIT_SETTLE, RxEvent, SerialTransport};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Lines
// ────────────────────────────────────────────────────────────────────────────

/// One recorded level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEvent {
    pub at: Instant,
    pub high: bool,
}

/// A completed high pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub start: Instant,
    pub width: Duration,
}

/// A simulated output line that records every write.
pub struct SimOutputLine {
    id: String,
    level: AtomicBool,
    fail: AtomicBool,
    history: Mutex<Vec<LineEvent>>,
}

impl SimOutputLine {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            level: AtomicBool::new(false),
            fail: AtomicBool::new(false),
            history: Mutex::new(Vec::new()),
        })
    }

    /// Make subsequent writes fail with [`SentinelError::LineFault`].
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every successful write, in order.
    pub fn history(&self) -> Vec<LineEvent> {
        locked(&self.history).clone()
    }

    /// Number of low→high transitions.
    pub fn rising_edges(&self) -> usize {
        self.level_changes().iter().filter(|e| e.high).count()
    }

    /// Completed high pulses (rising edge followed by a falling edge).
    pub fn pulses(&self) -> Vec<Pulse> {
        let mut pulses = Vec::new();
        let mut rose_at = None;
        for event in self.level_changes() {
            match (event.high, rose_at) {
                (true, None) => rose_at = Some(event.at),
                (false, Some(start)) => {
                    pulses.push(Pulse {
                        start,
                        width: event.at.duration_since(start),
                    });
                    rose_at = None;
                }
                _ => {}
            }
        }
        pulses
    }

    /// Writes that actually changed the level, starting from low.
    fn level_changes(&self) -> Vec<LineEvent> {
        let mut previous = false;
        self.history()
            .into_iter()
            .filter(|e| {
                let changed = e.high != previous;
                previous = e.high;
                changed
            })
            .collect()
    }
}

impl OutputLine for SimOutputLine {
    fn id(&self) -> &str {
        &self.id
    }

    fn set(&self, high: bool) -> Result<(), SentinelError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SentinelError::LineFault {
                line: self.id.clone(),
                details: "simulated write failure".to_string(),
            });
        }
        self.level.store(high, Ordering::SeqCst);
        locked(&self.history).push(LineEvent {
            at: Instant::now(),
            high,
        });
        Ok(())
    }

    fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

/// A simulated input line whose level the test controls.
pub struct SimInputLine {
    id: String,
    level: AtomicBool,
}

impl SimInputLine {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            level: AtomicBool::new(false),
        })
    }

    pub fn set_level(&self, high: bool) {
        self.level.store(high, Ordering::SeqCst);
    }
}

impl InputLine for SimInputLine {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Serial transport
// ────────────────────────────────────────────────────────────────────────────

/// One frame handed to the simulated transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub at: Instant,
    pub bytes: Vec<u8>,
}

/// A simulated TTC transport.
pub struct SimSerial {
    sent: Mutex<Vec<SentFrame>>,
    reinit_count: AtomicU32,
    fail_sends: AtomicBool,
    rx: broadcast::Sender<RxEvent>,
}

impl SimSerial {
    pub fn new() -> Arc<Self> {
        let (rx, _) = broadcast::channel(64);
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            reinit_count: AtomicU32::new(0),
            fail_sends: AtomicBool::new(false),
            rx,
        })
    }

    /// Deliver `bytes` as if they arrived on the uplink.
    pub fn inject_rx(&self, bytes: &[u8]) {
        // Nobody listening is fine: the bytes are simply lost, as on a wire.
        let _ = self.rx.send(RxEvent {
            bytes: bytes.to_vec(),
        });
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        locked(&self.sent).clone()
    }

    /// Sent frames that parse as telemetry.
    pub fn telemetry_frames(&self) -> Vec<TelemetryFrame> {
        self.sent()
            .iter()
            .filter_map(|f| TelemetryFrame::parse(&f.bytes).ok())
            .collect()
    }

    pub fn reinit_count(&self) -> u32 {
        self.reinit_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SerialTransport for SimSerial {
    async fn send(&self, frame: &[u8]) -> Result<(), SentinelError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SentinelError::Transport("simulated send failure".to_string()));
        }
        locked(&self.sent).push(SentFrame {
            at: Instant::now(),
            bytes: frame.to_vec(),
        });
        Ok(())
    }

    async fn reinit(&self) -> Result<(), SentinelError> {
        tokio::time::sleep(REINIT_SETTLE).await;
        self.reinit_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rx_stream(&self) -> BoxStream<'static, RxEvent> {
        let receiver = self.rx.subscribe();
        stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inference engine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct EngineState {
    available: bool,
    initialized: bool,
    scores: [f32; CLASS_COUNT],
    runs: u32,
    last_features: Option<[f32; FEATURE_WIDTH]>,
}

/// A scripted inference engine.  The engine itself is moved into the
/// [`Board`]; the test keeps a [`SimEngineHandle`] to steer it.
pub struct SimEngine {
    state: Arc<Mutex<EngineState>>,
}

/// Test-side handle onto a [`SimEngine`].
#[derive(Clone)]
pub struct SimEngineHandle {
    state: Arc<Mutex<EngineState>>,
}

/// Scores of a healthy system: class 0 dominates.
pub const NOMINAL_SCORES: [f32; CLASS_COUNT] = [0.96, 0.01, 0.01, 0.01, 0.01];

impl SimEngine {
    pub fn new() -> (Box<Self>, SimEngineHandle) {
        let state = Arc::new(Mutex::new(EngineState {
            available: true,
            initialized: false,
            scores: NOMINAL_SCORES,
            runs: 0,
            last_features: None,
        }));
        (
            Box::new(Self {
                state: Arc::clone(&state),
            }),
            SimEngineHandle { state },
        )
    }
}

impl InferenceEngine for SimEngine {
    fn init(&mut self) -> Result<(), SentinelError> {
        let mut state = locked(&self.state);
        if !state.available {
            return Err(SentinelError::EngineUnavailable(
                "simulated engine offline".to_string(),
            ));
        }
        state.initialized = true;
        Ok(())
    }

    fn infer(
        &mut self,
        features: &[f32; FEATURE_WIDTH],
    ) -> Result<[f32; CLASS_COUNT], SentinelError> {
        let mut state = locked(&self.state);
        if !state.available || !state.initialized {
            return Err(SentinelError::EngineUnavailable(
                "engine not initialised".to_string(),
            ));
        }
        state.runs += 1;
        state.last_features = Some(*features);
        Ok(state.scores)
    }
}

impl SimEngineHandle {
    /// Take the engine offline (and drop its initialisation) or bring it
    /// back.
    pub fn set_available(&self, available: bool) {
        let mut state = locked(&self.state);
        state.available = available;
        if !available {
            state.initialized = false;
        }
    }

    /// Scores returned by every subsequent inference.
    pub fn set_scores(&self, scores: [f32; CLASS_COUNT]) {
        locked(&self.state).scores = scores;
    }

    pub fn runs(&self) -> u32 {
        locked(&self.state).runs
    }

    pub fn is_initialized(&self) -> bool {
        locked(&self.state).initialized
    }

    pub fn last_features(&self) -> Option<[f32; FEATURE_WIDTH]> {
        locked(&self.state).last_features
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensors
// ────────────────────────────────────────────────────────────────────────────

/// Readings reported by [`SimSensors`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReadings {
    pub temperature: f32,
    pub voltage_3v3: f32,
    pub voltage_5v: f32,
    pub internal_vref: f32,
    pub current: f32,
    pub cpu_usage: f32,
    pub mem_usage: f32,
}

impl Default for SensorReadings {
    fn default() -> Self {
        Self {
            temperature: 25.0,
            voltage_3v3: 3.3,
            voltage_5v: 5.0,
            internal_vref: 1.2,
            current: 0.1,
            cpu_usage: 25.0,
            mem_usage: 50.0,
        }
    }
}

/// Simulated sensors with settable readings.
pub struct SimSensors {
    readings: Mutex<SensorReadings>,
    fail: AtomicBool,
}

impl SimSensors {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            readings: Mutex::new(SensorReadings::default()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set(&self, readings: SensorReadings) {
        *locked(&self.readings) = readings;
    }

    /// Make every subsequent read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn read(&self, pick: impl Fn(&SensorReadings) -> f32) -> Result<f32, SentinelError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SentinelError::Sensor("simulated ADC timeout".to_string()));
        }
        Ok(pick(&locked(&self.readings)))
    }
}

impl SensorProvider for SimSensors {
    fn temperature(&self) -> Result<f32, SentinelError> {
        self.read(|r| r.temperature)
    }

    fn voltage_3v3(&self) -> Result<f32, SentinelError> {
        self.read(|r| r.voltage_3v3)
    }

    fn voltage_5v(&self) -> Result<f32, SentinelError> {
        self.read(|r| r.voltage_5v)
    }

    fn internal_vref(&self) -> Result<f32, SentinelError> {
        self.read(|r| r.internal_vref)
    }

    fn current(&self) -> Result<f32, SentinelError> {
        self.read(|r| r.current)
    }

    fn cpu_usage(&self) -> Result<f32, SentinelError> {
        self.read(|r| r.cpu_usage)
    }

    fn mem_usage(&self) -> Result<f32, SentinelError> {
        self.read(|r| r.mem_usage)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Indicators
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct IndicatorState {
    steady: HashMap<IndicatorId, bool>,
    blink: HashMap<IndicatorId, u32>,
    colors: Vec<Rgb>,
}

/// Simulated indicator panel that remembers the latest state of each
/// indicator and every colour it was asked to show.
#[derive(Default)]
pub struct SimIndicators {
    state: Mutex<IndicatorState>,
}

impl SimIndicators {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_on(&self, id: IndicatorId) -> bool {
        locked(&self.state).steady.get(&id).copied().unwrap_or(false)
    }

    /// Current blink half-period of `id`, `0` when not blinking.
    pub fn blink_interval(&self, id: IndicatorId) -> u32 {
        locked(&self.state).blink.get(&id).copied().unwrap_or(0)
    }

    pub fn color(&self) -> Option<Rgb> {
        locked(&self.state).colors.last().copied()
    }

    pub fn color_history(&self) -> Vec<Rgb> {
        locked(&self.state).colors.clone()
    }
}

impl IndicatorSink for SimIndicators {
    fn set_indicator(&self, id: IndicatorId, on: bool) {
        let mut state = locked(&self.state);
        state.steady.insert(id, on);
        if !on {
            state.blink.insert(id, 0);
        }
    }

    fn set_indicator_blink(&self, id: IndicatorId, interval_ms: u32) {
        locked(&self.state).blink.insert(id, interval_ms);
    }

    fn set_color(&self, color: Rgb) {
        locked(&self.state).colors.push(color);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimBoard builder
// ────────────────────────────────────────────────────────────────────────────

/// Test-side view of every simulated driver in a [`Board`].
#[derive(Clone)]
pub struct SimHandles {
    pub heartbeat_in: Arc<SimInputLine>,
    pub heartbeat_out: Arc<SimOutputLine>,
    pub fault_active: Arc<SimOutputLine>,
    pub reset_request: Arc<SimOutputLine>,
    pub reset_out: Arc<SimOutputLine>,
    pub power_switches: Vec<Arc<SimOutputLine>>,
    pub wdog_wake: Arc<SimOutputLine>,
    pub wdog_done: Arc<SimInputLine>,
    pub power_supervisor: Arc<SimInputLine>,
    pub manual_reset: Arc<SimInputLine>,
    pub serial: Arc<SimSerial>,
    pub sensors: Arc<SimSensors>,
    pub indicators: Arc<SimIndicators>,
    pub engine: SimEngineHandle,
}

/// Builder that constructs a [`Board`] backed entirely by simulated
/// drivers.
pub struct SimBoard {
    power_switch_count: usize,
    with_power_supervisor: bool,
    with_manual_reset: bool,
}

impl Default for SimBoard {
    fn default() -> Self {
        Self {
            power_switch_count: 4,
            with_power_supervisor: true,
            with_manual_reset: true,
        }
    }
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of power-switch outputs (default 4).
    pub fn with_power_switches(mut self, count: usize) -> Self {
        self.power_switch_count = count;
        self
    }

    /// Leave the power-supervisor input unwired.
    pub fn without_power_supervisor(mut self) -> Self {
        self.with_power_supervisor = false;
        self
    }

    /// Leave the manual reset button unwired.
    pub fn without_manual_reset(mut self) -> Self {
        self.with_manual_reset = false;
        self
    }

    /// Consume the builder and return the board plus the simulation handles.
    pub fn build(self) -> (Board, SimHandles) {
        let (engine, engine_handle) = SimEngine::new();
        let sim = SimHandles {
            heartbeat_in: SimInputLine::new("heartbeat_in"),
            heartbeat_out: SimOutputLine::new("heartbeat_out"),
            fault_active: SimOutputLine::new("fault_active"),
            reset_request: SimOutputLine::new("reset_request"),
            reset_out: SimOutputLine::new("reset_out"),
            power_switches: (0..self.power_switch_count)
                .map(|i| SimOutputLine::new(format!("power_switch_{}", i + 1)))
                .collect(),
            wdog_wake: SimOutputLine::new("wdog_wake"),
            wdog_done: SimInputLine::new("wdog_done"),
            power_supervisor: SimInputLine::new("power_supervisor"),
            manual_reset: SimInputLine::new("manual_reset"),
            serial: SimSerial::new(),
            sensors: SimSensors::new(),
            indicators: SimIndicators::new(),
            engine: engine_handle,
        };

        let board = Board {
            heartbeat_in: sim.heartbeat_in.clone(),
            heartbeat_out: sim.heartbeat_out.clone(),
            fault_active: sim.fault_active.clone(),
            reset_request: sim.reset_request.clone(),
            reset_out: sim.reset_out.clone(),
            power_switches: sim
                .power_switches
                .iter()
                .map(|l| Arc::clone(l) as Arc<dyn OutputLine>)
                .collect(),
            wdog_wake: sim.wdog_wake.clone(),
            wdog_done: sim.wdog_done.clone(),
            power_supervisor: self
                .with_power_supervisor
                .then(|| Arc::clone(&sim.power_supervisor) as Arc<dyn InputLine>),
            manual_reset: self
                .with_manual_reset
                .then(|| Arc::clone(&sim.manual_reset) as Arc<dyn InputLine>),
            serial: sim.serial.clone(),
            sensors: sim.sensors.clone(),
            indicators: sim.indicators.clone(),
            engine,
        };
        (board, sim)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
