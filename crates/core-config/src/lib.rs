//! Configuration loading and parsing.
//!
//! Parses `forkfate.toml` (or an override path provided by the binary) into
//! four sections: `[spinner]`, `[race]`, `[search]` and `[audio]`. Every field
//! has a default, so a missing file, a missing section or a missing key all
//! fall back silently. Unknown fields are ignored to allow forward evolution.
//! A file that fails to parse is logged and replaced by defaults.
//!
//! Values are taken as written; `Config::apply_limits` then clamps anything
//! out of range and logs each clamp under the `config` target. The raw file
//! text is retained for diagnostics.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const FILE_NAME: &str = "forkfate.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SpinnerConfig {
    #[serde(default = "SpinnerConfig::default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "SpinnerConfig::default_slowdown_factor")]
    pub slowdown_factor: f64,
    #[serde(default = "SpinnerConfig::default_slowdown_ticks")]
    pub slowdown_ticks: u32,
    #[serde(default = "SpinnerConfig::default_reveal_delay_ms")]
    pub reveal_delay_ms: u64,
}

impl Default for SpinnerConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: Self::default_base_delay_ms(),
            slowdown_factor: Self::default_slowdown_factor(),
            slowdown_ticks: Self::default_slowdown_ticks(),
            reveal_delay_ms: Self::default_reveal_delay_ms(),
        }
    }
}

impl SpinnerConfig {
    const fn default_base_delay_ms() -> u64 {
        60
    }
    const fn default_slowdown_factor() -> f64 {
        1.25
    }
    const fn default_slowdown_ticks() -> u32 {
        10
    }
    const fn default_reveal_delay_ms() -> u64 {
        300
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RaceConfig {
    #[serde(default = "RaceConfig::default_countdown_from")]
    pub countdown_from: u32,
    #[serde(default = "RaceConfig::default_countdown_step_ms")]
    pub countdown_step_ms: u64,
    #[serde(default = "RaceConfig::default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "RaceConfig::default_resolution_delay_ms")]
    pub resolution_delay_ms: u64,
    /// How many racers the arena lets in.
    #[serde(default = "RaceConfig::default_max_racers")]
    pub max_racers: usize,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            countdown_from: Self::default_countdown_from(),
            countdown_step_ms: Self::default_countdown_step_ms(),
            frame_interval_ms: Self::default_frame_interval_ms(),
            resolution_delay_ms: Self::default_resolution_delay_ms(),
            max_racers: Self::default_max_racers(),
        }
    }
}

impl RaceConfig {
    const fn default_countdown_from() -> u32 {
        3
    }
    const fn default_countdown_step_ms() -> u64 {
        1000
    }
    const fn default_frame_interval_ms() -> u64 {
        16
    }
    const fn default_resolution_delay_ms() -> u64 {
        1500
    }
    const fn default_max_racers() -> usize {
        4
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    #[serde(default = "SearchConfig::default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "SearchConfig::default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "SearchConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "SearchConfig::default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "SearchConfig::default_radius_meters")]
    pub radius_meters: u32,
    /// `cheap`, `moderate` or `expensive`.
    #[serde(default = "SearchConfig::default_budget")]
    pub budget: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            api_key_env: Self::default_api_key_env(),
            base_url: Self::default_base_url(),
            timeout_seconds: Self::default_timeout_seconds(),
            radius_meters: Self::default_radius_meters(),
            budget: Self::default_budget(),
        }
    }
}

impl SearchConfig {
    fn default_model() -> String {
        "gemini-2.5-flash".to_string()
    }
    fn default_api_key_env() -> String {
        "API_KEY".to_string()
    }
    fn default_base_url() -> String {
        "https://generativelanguage.googleapis.com".to_string()
    }
    const fn default_timeout_seconds() -> u64 {
        30
    }
    const fn default_radius_meters() -> u32 {
        500
    }
    fn default_budget() -> String {
        "moderate".to_string()
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct AudioConfig {
    /// Ring the terminal bell on every roulette tick.
    #[serde(default)]
    pub tick_cue: bool,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub spinner: SpinnerConfig,
    #[serde(default)]
    pub race: RaceConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
    pub source: Option<PathBuf>,
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("forkfate").join(FILE_NAME);
    }
    PathBuf::from(FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "config_file_absent_using_defaults");
        return Ok(Config::default());
    };
    match parse(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                file,
                source: Some(path),
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %format!("{e:#}"), "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

/// Parse config text without touching the filesystem.
pub fn parse(content: &str) -> Result<ConfigFile> {
    toml::from_str::<ConfigFile>(content).context("invalid forkfate.toml")
}

const MIN_RADIUS_METERS: u32 = 100;
const MAX_RADIUS_METERS: u32 = 3000;
const RADIUS_STEP_METERS: u32 = 100;
const MIN_TIMEOUT_SECONDS: u64 = 5;
const MIN_RACERS: usize = 2;
const MAX_SLOWDOWN_FACTOR: f64 = 2.0;
/// Matches the shortest possible spin, so deceleration never covers more
/// than the whole spin.
const MAX_SLOWDOWN_TICKS: u32 = 30;

fn snap_radius(meters: u32) -> u32 {
    let clamped = meters.clamp(MIN_RADIUS_METERS, MAX_RADIUS_METERS);
    ((clamped + RADIUS_STEP_METERS / 2) / RADIUS_STEP_METERS * RADIUS_STEP_METERS)
        .clamp(MIN_RADIUS_METERS, MAX_RADIUS_METERS)
}

impl Config {
    /// Clamp out-of-range values in place. Returns how many fields changed.
    pub fn apply_limits(&mut self) -> usize {
        let mut clamps = 0;

        let spinner = &mut self.file.spinner;
        let raw = spinner.slowdown_factor;
        if !(raw.is_finite() && raw > 1.0) {
            spinner.slowdown_factor = SpinnerConfig::default_slowdown_factor();
            info!(target: "config", raw, clamped = spinner.slowdown_factor, "spinner_slowdown_factor_clamped");
            clamps += 1;
        } else if raw > MAX_SLOWDOWN_FACTOR {
            spinner.slowdown_factor = MAX_SLOWDOWN_FACTOR;
            info!(target: "config", raw, clamped = MAX_SLOWDOWN_FACTOR, "spinner_slowdown_factor_clamped");
            clamps += 1;
        }
        if spinner.slowdown_ticks > MAX_SLOWDOWN_TICKS {
            let raw = spinner.slowdown_ticks;
            spinner.slowdown_ticks = MAX_SLOWDOWN_TICKS;
            info!(target: "config", raw, clamped = MAX_SLOWDOWN_TICKS, "spinner_slowdown_ticks_clamped");
            clamps += 1;
        }
        if spinner.base_delay_ms == 0 {
            spinner.base_delay_ms = 1;
            info!(target: "config", raw = 0, clamped = 1, "spinner_base_delay_clamped");
            clamps += 1;
        }

        let race = &mut self.file.race;
        if race.frame_interval_ms == 0 {
            race.frame_interval_ms = 1;
            info!(target: "config", raw = 0, clamped = 1, "race_frame_interval_clamped");
            clamps += 1;
        }
        if race.max_racers < MIN_RACERS {
            let raw = race.max_racers;
            race.max_racers = MIN_RACERS;
            info!(target: "config", raw, clamped = MIN_RACERS, "race_max_racers_clamped");
            clamps += 1;
        }

        let search = &mut self.file.search;
        let raw = search.radius_meters;
        let snapped = snap_radius(raw);
        if snapped != raw {
            search.radius_meters = snapped;
            info!(target: "config", raw, clamped = snapped, min = MIN_RADIUS_METERS, max = MAX_RADIUS_METERS, "search_radius_clamped");
            clamps += 1;
        }
        if search.timeout_seconds < MIN_TIMEOUT_SECONDS {
            let raw = search.timeout_seconds;
            search.timeout_seconds = MIN_TIMEOUT_SECONDS;
            info!(target: "config", raw, clamped = MIN_TIMEOUT_SECONDS, "search_timeout_clamped");
            clamps += 1;
        }
        clamps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn load_str(text: &str) -> Config {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), text).unwrap();
        load_from(Some(tmp.path().to_path_buf())).unwrap()
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.file, ConfigFile::default());
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.file.spinner.base_delay_ms, 60);
        assert_eq!(cfg.file.race.max_racers, 4);
        assert_eq!(cfg.file.search.model, "gemini-2.5-flash");
        assert!(!cfg.file.audio.tick_cue);
    }

    #[test]
    fn parses_partial_sections() {
        let cfg = load_str("[race]\nmax_racers = 6\n\n[audio]\ntick_cue = true\n");
        assert_eq!(cfg.file.race.max_racers, 6);
        assert_eq!(cfg.file.race.countdown_from, 3);
        assert!(cfg.file.audio.tick_cue);
        assert_eq!(cfg.file.spinner, SpinnerConfig::default());
        assert!(cfg.raw.is_some());
    }

    #[test]
    fn parses_every_field() {
        let cfg = load_str(
            r#"
[spinner]
base_delay_ms = 40
slowdown_factor = 1.5
slowdown_ticks = 8
reveal_delay_ms = 100

[race]
countdown_from = 5
countdown_step_ms = 500
frame_interval_ms = 33
resolution_delay_ms = 2000
max_racers = 3

[search]
model = "gemini-2.5-pro"
api_key_env = "GEMINI_KEY"
base_url = "http://localhost:8080"
timeout_seconds = 12
radius_meters = 1200
budget = "cheap"
"#,
        );
        assert_eq!(
            cfg.file.spinner,
            SpinnerConfig {
                base_delay_ms: 40,
                slowdown_factor: 1.5,
                slowdown_ticks: 8,
                reveal_delay_ms: 100,
            }
        );
        assert_eq!(cfg.file.race.frame_interval_ms, 33);
        assert_eq!(cfg.file.search.api_key_env, "GEMINI_KEY");
        assert_eq!(cfg.file.search.budget, "cheap");
        let mut cfg = cfg;
        assert_eq!(cfg.apply_limits(), 0);
    }

    #[test]
    fn parse_error_falls_back_to_defaults() {
        let cfg = load_str("[spinner\nbase_delay_ms = ");
        assert_eq!(cfg.file, ConfigFile::default());
        assert!(cfg.raw.is_none());
        assert!(parse("[race]\nmax_racers = \"many\"\n").is_err());
    }

    #[test]
    fn limits_clamp_out_of_range_values() {
        let mut cfg = load_str(
            "[spinner]\nslowdown_factor = 0.8\n[race]\nframe_interval_ms = 0\nmax_racers = 1\n[search]\nradius_meters = 7777\ntimeout_seconds = 1\n",
        );
        assert_eq!(cfg.apply_limits(), 5);
        assert_eq!(cfg.file.spinner.slowdown_factor, 1.25);
        assert_eq!(cfg.file.race.frame_interval_ms, 1);
        assert_eq!(cfg.file.race.max_racers, 2);
        assert_eq!(cfg.file.search.radius_meters, 3000);
        assert_eq!(cfg.file.search.timeout_seconds, 5);
        // Idempotent.
        assert_eq!(cfg.apply_limits(), 0);
    }

    #[test]
    fn steep_slowdown_is_capped() {
        let mut cfg = load_str("[spinner]\nslowdown_factor = 1e10\nslowdown_ticks = 49\n");
        assert_eq!(cfg.apply_limits(), 2);
        assert_eq!(cfg.file.spinner.slowdown_factor, 2.0);
        assert_eq!(cfg.file.spinner.slowdown_ticks, 30);

        let mut cfg = load_str("[spinner]\nslowdown_factor = 2.0\nslowdown_ticks = 30\n");
        assert_eq!(cfg.apply_limits(), 0);

        let mut cfg = load_str("[spinner]\nslowdown_factor = inf\n");
        assert_eq!(cfg.apply_limits(), 1);
        assert_eq!(cfg.file.spinner.slowdown_factor, 1.25);
    }

    #[test]
    fn radius_snaps_to_hundreds() {
        assert_eq!(snap_radius(0), 100);
        assert_eq!(snap_radius(449), 400);
        assert_eq!(snap_radius(450), 500);
        assert_eq!(snap_radius(3000), 3000);
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let mut cfg = load_str("[race]\nmax_racers = 0\n");
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        with_default(subscriber, || {
            cfg.apply_limits();
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("race_max_racers_clamped"));
        assert_eq!(cfg.file.race.max_racers, 2);
    }
}
