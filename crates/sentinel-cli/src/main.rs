//! `sentinel-cli` – OBC Sentinel demo runner
//!
//! Boots the watchdog on a simulated board and plays a scenario against it:
//!
//! 1. Loads `~/.sentinel/config.toml` (defaults when absent, `SENTINEL_*`
//!    environment overrides on top).  `sentinel --init-config` writes the
//!    effective scenario to that path and exits.
//! 2. Starts every watchdog task and drives the simulated heartbeat, uplink
//!    and classifier as the scenario describes.
//! 3. Prints each mode transition in the status-light colour.
//! 4. Stops when the hardware reset line pulses, the run time elapses, or
//!    Ctrl-C is pressed.

mod config;
mod scenario;

use colored::{ColoredString, Colorize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use sentinel_types::SystemMode;
use scenario::{RunEnd, RunSummary};

fn main() {
    let _telemetry = sentinel_runtime::init_tracing("sentinel");

    print_banner();

    let init_only = std::env::args().skip(1).any(|a| a == "--init-config");

    let file = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Scenario loaded from {}",
                config::config_path().display().to_string().bold()
            );
            Some(cfg)
        }
        Ok(None) => {
            println!("  No scenario file found, using the built-in scenario.");
            None
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using the built-in scenario.");
            None
        }
    };
    let cfg = config::effective(file);

    if init_only {
        match config::save(&cfg) {
            Ok(()) => println!(
                "  {} Scenario saved to {}",
                "✓".green().bold(),
                config::config_path().display().to_string().bold()
            ),
            Err(e) => {
                println!("{}: {}", "Error saving config".red(), e);
                std::process::exit(1);
            }
        }
        return;
    }

    print_scenario(&cfg);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received, stopping the run …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the run can only end on its own");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            std::process::exit(1);
        }
    };

    println!();
    let summary = runtime.block_on(scenario::run(&cfg, shutdown, |change| {
        println!(
            "  {:>7} ms  {} → {}",
            change.tick_ms,
            mode_label(change.from),
            mode_label(change.to)
        );
    }));
    print_summary(&summary);
}

fn mode_label(mode: SystemMode) -> ColoredString {
    let c = mode.color();
    mode.as_str().truecolor(c.r, c.g, c.b).bold()
}

fn fmt_optional_ms(value: Option<u64>) -> String {
    value.map_or_else(|| "never".to_string(), |ms| format!("{ms} ms"))
}

fn print_banner() {
    println!();
    println!("{}", "  ╔═╗┌─┐┌┐┌┌┬┐┬┌┐┌┌─┐┬  ".bold().cyan());
    println!("{}", "  ╚═╗├┤ │││ │ ││││├┤ │  ".bold().cyan());
    println!("{}", "  ╚═╝└─┘┘└┘ ┴ ┴┘└┘└─┘┴─┘".bold().cyan());
    println!();
    println!(
        "  {} {}",
        "OBC Sentinel".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  On-board computer watchdog, simulated board");
    println!();
}

fn print_scenario(cfg: &config::Config) {
    println!();
    println!("  {}", "Scenario".bold());
    println!("    heartbeat period     {} ms", cfg.heartbeat_period_ms);
    println!(
        "    heartbeat stops      {}",
        fmt_optional_ms(cfg.heartbeat_silent_after_ms)
    );
    println!("    uplink every         {} ms", cfg.ttc_rx_interval_ms);
    println!(
        "    uplink stops         {}",
        fmt_optional_ms(cfg.ttc_silent_after_ms)
    );
    println!("    engine available     {}", cfg.engine_available);
    if let Some(script) = &cfg.scripted_scores {
        println!(
            "    scripted scores      {:?} at {} ms for {} ms",
            script.scores, script.at_ms, script.hold_ms
        );
    }
    println!(
        "    software reset       {}",
        fmt_optional_ms(cfg.software_reset_at_ms)
    );
    println!("    run for              {} ms", cfg.run_for_ms);
}

fn print_summary(summary: &RunSummary) {
    println!();
    let ending = match summary.end {
        RunEnd::HardwareReset => "hardware reset issued".red().bold(),
        RunEnd::Elapsed => "run time elapsed".green().bold(),
        RunEnd::Interrupted => "interrupted".yellow().bold(),
    };
    println!("  Run ended: {}", ending);
    println!("    final mode           {}", mode_label(summary.final_mode));
    println!("    mode transitions     {}", summary.mode_changes.len());
    println!("    telemetry frames     {}", summary.telemetry_frames);
    println!("    link restarts        {}", summary.link_restarts);
    println!("    OBC reset requests   {}", summary.reset_requests);
    if summary.faults_dropped > 0 {
        println!(
            "    {}",
            format!("{} fault report(s) dropped", summary.faults_dropped).yellow()
        );
    }
    println!();
}
