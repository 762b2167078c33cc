//! Scenario configuration – reads/writes `~/.sentinel/config.toml`.
//!
//! The file describes what the simulated board does during a run; the
//! watchdog's own policy is fixed and not configurable here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Classifier output scripted for a window of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedScores {
    /// Run time at which the scores start being returned.
    pub at_ms: u64,
    /// How long they are returned before the engine goes back to nominal.
    #[serde(default = "default_script_hold")]
    pub hold_ms: u64,
    /// One score per class: none, no-heartbeat, overcurrent, TTC timeout,
    /// data corruption.
    pub scores: [f32; 5],
}

/// Persisted scenario stored in `~/.sentinel/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Period of the simulated OBC heartbeat.
    #[serde(default = "default_heartbeat_period")]
    pub heartbeat_period_ms: u64,

    /// Run time after which the OBC stops pulsing; absent means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_silent_after_ms: Option<u64>,

    /// Interval between simulated ground uplink frames.
    #[serde(default = "default_ttc_rx_interval")]
    pub ttc_rx_interval_ms: u64,

    /// Run time after which the uplink goes quiet; absent means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttc_silent_after_ms: Option<u64>,

    /// Whether the inference engine comes up.
    #[serde(default = "default_true")]
    pub engine_available: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripted_scores: Option<ScriptedScores>,

    /// Run time at which a software reset is requested; absent means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_reset_at_ms: Option<u64>,

    /// Upper bound on the run.  The run also ends as soon as the hardware
    /// reset line pulses.
    #[serde(default = "default_run_for")]
    pub run_for_ms: u64,
}

fn default_heartbeat_period() -> u64 {
    1000
}
fn default_ttc_rx_interval() -> u64 {
    500
}
fn default_true() -> bool {
    true
}
fn default_script_hold() -> u64 {
    150
}
fn default_run_for() -> u64 {
    15_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heartbeat_period_ms: default_heartbeat_period(),
            heartbeat_silent_after_ms: Some(3000),
            ttc_rx_interval_ms: default_ttc_rx_interval(),
            ttc_silent_after_ms: None,
            engine_available: true,
            scripted_scores: None,
            software_reset_at_ms: None,
            run_for_ms: default_run_for(),
        }
    }
}

/// Return the path to `~/.sentinel/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".sentinel").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// The scenario actually run: the file contents (built-in defaults when
/// there is none) with `SENTINEL_*` overrides on top.
pub fn effective(file: Option<Config>) -> Config {
    let mut cfg = file.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    cfg
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Parse an optional millisecond value; `never`, `off` and `none` clear it.
fn parse_optional_ms(value: &str) -> Option<Option<u64>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "never" | "off" | "none" => Some(None),
        other => other.parse().ok().map(Some),
    }
}

/// Apply `SENTINEL_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SENTINEL_HEARTBEAT_PERIOD_MS` | `heartbeat_period_ms` |
/// | `SENTINEL_HEARTBEAT_SILENT_AFTER_MS` | `heartbeat_silent_after_ms` (`never` clears) |
/// | `SENTINEL_TTC_RX_INTERVAL_MS` | `ttc_rx_interval_ms` |
/// | `SENTINEL_TTC_SILENT_AFTER_MS` | `ttc_silent_after_ms` (`never` clears) |
/// | `SENTINEL_ENGINE_AVAILABLE` | `engine_available` |
/// | `SENTINEL_SOFTWARE_RESET_AT_MS` | `software_reset_at_ms` (`never` clears) |
/// | `SENTINEL_RUN_FOR_MS` | `run_for_ms` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SENTINEL_HEARTBEAT_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.heartbeat_period_ms = ms;
    }
    if let Ok(v) = std::env::var("SENTINEL_HEARTBEAT_SILENT_AFTER_MS")
        && let Some(ms) = parse_optional_ms(&v)
    {
        cfg.heartbeat_silent_after_ms = ms;
    }
    if let Ok(v) = std::env::var("SENTINEL_TTC_RX_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.ttc_rx_interval_ms = ms;
    }
    if let Ok(v) = std::env::var("SENTINEL_TTC_SILENT_AFTER_MS")
        && let Some(ms) = parse_optional_ms(&v)
    {
        cfg.ttc_silent_after_ms = ms;
    }
    if let Ok(v) = std::env::var("SENTINEL_ENGINE_AVAILABLE")
        && let Ok(available) = v.parse::<bool>()
    {
        cfg.engine_available = available;
    }
    if let Ok(v) = std::env::var("SENTINEL_SOFTWARE_RESET_AT_MS")
        && let Some(ms) = parse_optional_ms(&v)
    {
        cfg.software_reset_at_ms = ms;
    }
    if let Ok(v) = std::env::var("SENTINEL_RUN_FOR_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.run_for_ms = ms;
    }
}

/// Save the config to disk, creating `~/.sentinel/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.heartbeat_period_ms, 1000);
        assert_eq!(loaded.heartbeat_silent_after_ms, Some(3000));
        assert_eq!(loaded.run_for_ms, 15_000);
        assert!(loaded.engine_available);
    }

    #[test]
    fn roundtrip_silent_heartbeat_never() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        let cfg = Config {
            heartbeat_silent_after_ms: None,
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.heartbeat_silent_after_ms, None);
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn roundtrip_scripted_scores() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        let cfg = Config {
            scripted_scores: Some(ScriptedScores {
                at_ms: 2000,
                hold_ms: 300,
                scores: [0.0, 0.0, 0.9, 0.0, 0.0],
            }),
            software_reset_at_ms: Some(9000),
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.scripted_scores, cfg.scripted_scores);
        assert_eq!(loaded.software_reset_at_ms, Some(9000));
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "heartbeat_period_ms = 700\nttc_silent_after_ms = 4000\n").unwrap();
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.heartbeat_period_ms, 700);
        assert_eq!(loaded.ttc_silent_after_ms, Some(4000));
        assert_eq!(loaded.ttc_rx_interval_ms, 500);
        assert_eq!(loaded.scripted_scores, None);
        assert_eq!(loaded.heartbeat_silent_after_ms, None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "heartbeat_period_ms = \"soon\"").unwrap();
        assert!(load_from(&path).unwrap_err().contains("parse"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn config_path_points_to_sentinel_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".sentinel"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn optional_ms_parsing() {
        assert_eq!(parse_optional_ms("never"), Some(None));
        assert_eq!(parse_optional_ms(" 2500 "), Some(Some(2500)));
        assert_eq!(parse_optional_ms("soon"), None);
    }

    #[test]
    fn apply_env_overrides_changes_fields() {
        // SAFETY: these variables are only touched by this test.
        unsafe {
            std::env::set_var("SENTINEL_HEARTBEAT_SILENT_AFTER_MS", "never");
            std::env::set_var("SENTINEL_RUN_FOR_MS", "4000");
            std::env::set_var("SENTINEL_ENGINE_AVAILABLE", "not-a-bool");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.heartbeat_silent_after_ms, None);
        assert_eq!(cfg.run_for_ms, 4000);
        assert!(cfg.engine_available);
        unsafe {
            std::env::remove_var("SENTINEL_HEARTBEAT_SILENT_AFTER_MS");
            std::env::remove_var("SENTINEL_RUN_FOR_MS");
            std::env::remove_var("SENTINEL_ENGINE_AVAILABLE");
        }
    }

    #[test]
    fn effective_applies_overrides_with_or_without_file() {
        // SAFETY: this variable is only touched by this test.
        unsafe {
            std::env::set_var("SENTINEL_TTC_RX_INTERVAL_MS", "250");
        }
        let from_defaults = effective(None);
        let from_file = effective(Some(Config {
            run_for_ms: 2000,
            ..Config::default()
        }));
        unsafe {
            std::env::remove_var("SENTINEL_TTC_RX_INTERVAL_MS");
        }
        assert_eq!(from_defaults.ttc_rx_interval_ms, 250);
        assert_eq!(from_file.ttc_rx_interval_ms, 250);
        assert_eq!(from_file.run_for_ms, 2000);
    }
}
