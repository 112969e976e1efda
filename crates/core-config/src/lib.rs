//! Configuration loading and parsing.
//!
//! Parses `framewatch.toml` (or an override path provided by the binary or
//! the host integration). Every value has a default, so a missing file, a
//! missing section or a parse error all yield a usable [`Config`]. Unknown
//! fields are ignored to allow forward evolution.
//!
//! The raw file sections are converted into the typed settings consumed by
//! the watcher, tracker and report crates via [`Config::watcher`],
//! [`Config::tracker`] and [`Config::report`].

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "framewatch.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WatcherSection {
    #[serde(default = "WatcherSection::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "WatcherSection::default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
    /// Files older than job start minus this margin are leftovers from a previous job.
    #[serde(default = "WatcherSection::default_stale_margin_secs")]
    pub stale_margin_secs: f64,
    /// Bounded wait when stopping a watcher at job reset or shutdown.
    #[serde(default = "WatcherSection::default_join_timeout_ms")]
    pub join_timeout_ms: u64,
    #[serde(default = "WatcherSection::default_use_fs_events")]
    pub use_fs_events: bool,
}

impl Default for WatcherSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            inactivity_timeout_secs: Self::default_inactivity_timeout_secs(),
            stale_margin_secs: Self::default_stale_margin_secs(),
            join_timeout_ms: Self::default_join_timeout_ms(),
            use_fs_events: Self::default_use_fs_events(),
        }
    }
}

impl WatcherSection {
    const fn default_poll_interval_ms() -> u64 {
        1000
    }
    const fn default_inactivity_timeout_secs() -> u64 {
        600
    }
    const fn default_stale_margin_secs() -> f64 {
        2.0
    }
    const fn default_join_timeout_ms() -> u64 {
        2000
    }
    const fn default_use_fs_events() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TrackerSection {
    /// Callbacks closer together than this are treated as batched (not real renders).
    #[serde(default = "TrackerSection::default_fast_callback_secs")]
    pub fast_callback_secs: f64,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            fast_callback_secs: Self::default_fast_callback_secs(),
        }
    }
}

impl TrackerSection {
    const fn default_fast_callback_secs() -> f64 {
        0.2
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReportSection {
    #[serde(default = "ReportSection::default_grace_period_secs")]
    pub grace_period_secs: f64,
    #[serde(default = "ReportSection::default_max_lights")]
    pub max_lights: usize,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            grace_period_secs: Self::default_grace_period_secs(),
            max_lights: Self::default_max_lights(),
        }
    }
}

impl ReportSection {
    const fn default_grace_period_secs() -> f64 {
        5.0
    }
    const fn default_max_lights() -> usize {
        5
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub watcher: WatcherSection,
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub report: ReportSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub path: Option<PathBuf>,
    pub file: ConfigFile, // parsed (or default) data
}

/// Typed watcher settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatcherSettings {
    pub poll_interval: Duration,
    pub inactivity_timeout: Duration,
    pub stale_margin: Duration,
    pub join_timeout: Duration,
    pub use_fs_events: bool,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        WatcherSection::default().into()
    }
}

impl From<WatcherSection> for WatcherSettings {
    fn from(s: WatcherSection) -> Self {
        Self {
            // A zero interval would turn the poll loop into a spin.
            poll_interval: Duration::from_millis(s.poll_interval_ms.max(1)),
            inactivity_timeout: Duration::from_secs(s.inactivity_timeout_secs),
            stale_margin: secs_f64(s.stale_margin_secs),
            join_timeout: Duration::from_millis(s.join_timeout_ms),
            use_fs_events: s.use_fs_events,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerSettings {
    pub fast_callback: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        TrackerSection::default().into()
    }
}

impl From<TrackerSection> for TrackerSettings {
    fn from(s: TrackerSection) -> Self {
        Self {
            fast_callback: secs_f64(s.fast_callback_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportSettings {
    pub grace_period: Duration,
    pub max_lights: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSection::default().into()
    }
}

impl From<ReportSection> for ReportSettings {
    fn from(s: ReportSection) -> Self {
        Self {
            grace_period: secs_f64(s.grace_period_secs),
            max_lights: s.max_lights,
        }
    }
}

/// Negative, NaN or overflowing values collapse to zero instead of panicking.
fn secs_f64(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Best-effort config path: working directory first, then the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("framewatch").join(CONFIG_FILE_NAME);
    }
    // Final fallback relative filename.
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "config_defaults");
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                path: Some(path),
                file,
            })
        }
        Err(e) => {
            // Parse errors fall back to defaults; a broken config must not stop a render.
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_error");
            Ok(Config::default())
        }
    }
}

impl Config {
    pub fn watcher(&self) -> WatcherSettings {
        self.file.watcher.clone().into()
    }

    pub fn tracker(&self) -> TrackerSettings {
        self.file.tracker.clone().into()
    }

    pub fn report(&self) -> ReportSettings {
        self.file.report.clone().into()
    }
}
