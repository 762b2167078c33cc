//! Drives a simulated board through a configured scenario.
//!
//! The watchdog itself runs unmodified; this module only plays the part of
//! the outside world: the OBC heartbeat, the ground uplink, the classifier
//! output and an operator requesting a software reset.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sentinel_hal::sim::{NOMINAL_SCORES, SimBoard, SimHandles};
use sentinel_middleware::ModeChange;
use sentinel_runtime::Sentinel;
use sentinel_types::SystemMode;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval, sleep, sleep_until};
use tracing::{Instrument, debug, info, info_span};

use crate::config::Config;

/// Frame injected on the simulated uplink.
const UPLINK_FRAME: &[u8] = b"CMD:PING";

/// How often the run loop checks for its exit conditions.
const POLL_PERIOD: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The hardware reset line pulsed; the real module would now restart.
    HardwareReset,
    Elapsed,
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub end: RunEnd,
    pub final_mode: SystemMode,
    pub mode_changes: Vec<ModeChange>,
    pub telemetry_frames: usize,
    pub link_restarts: u32,
    pub reset_requests: usize,
    pub faults_dropped: u64,
}

fn at(start: Instant, ms: u64) -> Instant {
    start + Duration::from_millis(ms)
}

/// Square wave on the heartbeat input until the OBC goes silent.
fn drive_heartbeat(sim: &SimHandles, cfg: &Config, start: Instant) -> JoinHandle<()> {
    let line = sim.heartbeat_in.clone();
    let half = Duration::from_millis((cfg.heartbeat_period_ms / 2).max(1));
    let silent_at = cfg.heartbeat_silent_after_ms.map(|ms| at(start, ms));
    tokio::spawn(async move {
        let mut level = false;
        let mut next = start + half;
        loop {
            sleep_until(next).await;
            if silent_at.is_some_and(|t| next >= t) {
                line.set_level(false);
                debug!("obc heartbeat stopped");
                return;
            }
            level = !level;
            line.set_level(level);
            next += half;
        }
    })
}

fn drive_uplink(sim: &SimHandles, cfg: &Config, start: Instant) -> JoinHandle<()> {
    let serial = sim.serial.clone();
    let every = Duration::from_millis(cfg.ttc_rx_interval_ms.max(1));
    let silent_at = cfg.ttc_silent_after_ms.map(|ms| at(start, ms));
    tokio::spawn(async move {
        let mut next = start + every;
        loop {
            sleep_until(next).await;
            if silent_at.is_some_and(|t| next >= t) {
                debug!("ground uplink silent");
                return;
            }
            serial.inject_rx(UPLINK_FRAME);
            next += every;
        }
    })
}

fn drive_scores(sim: &SimHandles, cfg: &Config, start: Instant) -> Option<JoinHandle<()>> {
    let script = cfg.scripted_scores.clone()?;
    let engine = sim.engine.clone();
    Some(tokio::spawn(async move {
        sleep_until(at(start, script.at_ms)).await;
        info!(scores = ?script.scores, "scripted classifier output");
        engine.set_scores(script.scores);
        sleep(Duration::from_millis(script.hold_ms)).await;
        engine.set_scores(NOMINAL_SCORES);
    }))
}

/// Run `cfg` against a fresh simulated board.
///
/// `on_change` sees every mode transition as it happens.  The run ends when
/// the reset line pulses, `run_for_ms` elapses, or `shutdown` is set.
pub async fn run(
    cfg: &Config,
    shutdown: Arc<AtomicBool>,
    mut on_change: impl FnMut(&ModeChange),
) -> RunSummary {
    let (board, sim) = SimBoard::new().build();
    sim.engine.set_available(cfg.engine_available);

    let sentinel = Sentinel::new(board);
    let mut modes = sentinel.subscribe_modes();
    let handle = sentinel.start();
    let start = Instant::now();

    let mut drivers = vec![
        drive_heartbeat(&sim, cfg, start),
        drive_uplink(&sim, cfg, start),
    ];
    drivers.extend(drive_scores(&sim, cfg, start));

    let deadline = at(start, cfg.run_for_ms);
    let mut software_reset_at = cfg.software_reset_at_ms.map(|ms| at(start, ms));
    let mut mode_changes = Vec::new();
    let mut poll = interval(POLL_PERIOD);

    let end = async {
        loop {
            tokio::select! {
                Some(change) = modes.recv() => {
                    on_change(&change);
                    mode_changes.push(change);
                }
                _ = poll.tick() => {
                    let now = Instant::now();
                    if shutdown.load(Ordering::SeqCst) {
                        return RunEnd::Interrupted;
                    }
                    if sim.reset_out.rising_edges() > 0 {
                        return RunEnd::HardwareReset;
                    }
                    if now >= deadline {
                        return RunEnd::Elapsed;
                    }
                    if software_reset_at.is_some_and(|t| now >= t) {
                        software_reset_at = None;
                        info!("operator software reset request");
                        handle.request_software_reset();
                    }
                }
            }
        }
    }
    .instrument(info_span!("scenario", run_for_ms = cfg.run_for_ms))
    .await;

    // Transitions published in the same instant as the exit condition.
    while let Ok(Some(change)) = tokio::time::timeout(Duration::ZERO, modes.recv()).await {
        on_change(&change);
        mode_changes.push(change);
    }

    for driver in drivers {
        driver.abort();
    }
    let summary = RunSummary {
        end,
        final_mode: handle.mode(),
        mode_changes,
        telemetry_frames: sim.serial.telemetry_frames().len(),
        link_restarts: sim.serial.reinit_count(),
        reset_requests: sim.reset_request.pulses().len(),
        faults_dropped: handle.faults_dropped(),
    };
    handle.shutdown();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScriptedScores;

    async fn run_quiet(cfg: &Config) -> RunSummary {
        run(cfg, Arc::new(AtomicBool::new(false)), |_| {}).await
    }

    fn visited(summary: &RunSummary) -> Vec<SystemMode> {
        summary.mode_changes.iter().map(|c| c.to).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn default_scenario_detects_silent_obc() {
        let summary = run_quiet(&Config::default()).await;
        assert_eq!(summary.end, RunEnd::Elapsed);
        assert_eq!(summary.final_mode, SystemMode::ObcFault);
        assert!(visited(&summary).contains(&SystemMode::Normal));
        assert_eq!(summary.reset_requests, 1);
        assert_eq!(summary.link_restarts, 0);
        assert!(summary.telemetry_frames > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_run_stays_normal() {
        let cfg = Config {
            heartbeat_silent_after_ms: None,
            run_for_ms: 10_000,
            ..Config::default()
        };
        let summary = run_quiet(&cfg).await;
        assert_eq!(summary.end, RunEnd::Elapsed);
        assert_eq!(summary.final_mode, SystemMode::Normal);
        assert_eq!(summary.reset_requests, 0);
        assert_eq!(summary.faults_dropped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn software_reset_ends_run_with_hardware_reset() {
        let cfg = Config {
            heartbeat_silent_after_ms: None,
            software_reset_at_ms: Some(2000),
            ..Config::default()
        };
        let summary = run_quiet(&cfg).await;
        assert_eq!(summary.end, RunEnd::HardwareReset);
        assert_eq!(summary.final_mode, SystemMode::ResetPending);
        assert_eq!(visited(&summary).last(), Some(&SystemMode::ResetPending));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_uplink_restarts_link() {
        let cfg = Config {
            heartbeat_silent_after_ms: None,
            ttc_silent_after_ms: Some(1000),
            run_for_ms: 6000,
            ..Config::default()
        };
        let summary = run_quiet(&cfg).await;
        assert!(visited(&summary).contains(&SystemMode::TtcFault));
        assert!(summary.link_restarts >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_overcurrent_enters_warning() {
        let cfg = Config {
            heartbeat_silent_after_ms: None,
            scripted_scores: Some(ScriptedScores {
                at_ms: 2000,
                hold_ms: 150,
                scores: [0.0, 0.0, 0.9, 0.05, 0.05],
            }),
            run_for_ms: 5000,
            ..Config::default()
        };
        let summary = run_quiet(&cfg).await;
        assert!(visited(&summary).contains(&SystemMode::Warning));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flag_interrupts_run() {
        let shutdown = Arc::new(AtomicBool::new(true));
        let summary = run(&Config::default(), shutdown, |_| {}).await;
        assert_eq!(summary.end, RunEnd::Interrupted);
    }
}
