//! Configuration management for the jukebox player
//!
//! Two tiers:
//! 1. **TOML bootstrap**: data folder, player endpoints, timeouts, logging.
//!    Read once at startup; every field has a built-in default.
//! 2. **Settings document**: access policy and backend preference, re-read on
//!    demand (see [`crate::settings`]).

use jukebox_common::time::millis_to_duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Folder holding queue, playlist and settings documents
    ///
    /// If not specified, resolved from CLI → environment → OS default.
    pub data_folder: Option<PathBuf>,

    /// HTTP-controllable player endpoint
    pub vlc: VlcConfig,

    /// Daemon player endpoint
    pub mpd: MpdConfig,

    /// Timeouts, retries and polling cadence
    pub timing: TimingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// VLC web interface endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VlcConfig {
    pub host: String,
    pub port: u16,
    /// Web interface password (user name is always empty)
    pub password: String,
}

impl Default for VlcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            password: String::new(),
        }
    }
}

impl VlcConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// MPD endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MpdConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl Default for MpdConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6600,
            password: None,
        }
    }
}

impl MpdConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Timing and retry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Upper bound for one serialized playback command
    pub command_timeout_ms: u64,
    /// Upper bound for a backend switch, including connect retries
    pub switch_timeout_ms: u64,
    /// Upper bound for a single status poll against a backend
    pub status_timeout_ms: u64,
    /// Upper bound for a single connect or control request
    pub connect_timeout_ms: u64,
    /// Connect attempts made by a backend switch before giving up
    pub connect_attempts: u32,
    /// Backoff before the second connect attempt; doubles per attempt
    pub connect_backoff_ms: u64,
    /// Extra play attempts for a failing entry before it is skipped
    pub play_retry_limit: u32,
    /// Background status refresh interval (0 disables polling)
    pub status_poll_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 5000,
            switch_timeout_ms: 20000,
            status_timeout_ms: 1000,
            connect_timeout_ms: 3000,
            connect_attempts: 3,
            connect_backoff_ms: 250,
            play_retry_limit: 2,
            status_poll_interval_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn command_timeout(&self) -> Duration {
        millis_to_duration(self.command_timeout_ms)
    }

    pub fn switch_timeout(&self) -> Duration {
        millis_to_duration(self.switch_timeout_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        millis_to_duration(self.status_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        millis_to_duration(self.connect_timeout_ms)
    }

    pub fn connect_backoff(&self) -> Duration {
        millis_to_duration(self.connect_backoff_ms)
    }

    /// `None` when background polling is disabled
    pub fn status_poll_interval(&self) -> Option<Duration> {
        (self.status_poll_interval_ms > 0).then(|| millis_to_duration(self.status_poll_interval_ms))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Locations of the persisted documents inside the data folder
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Queue snapshot document
    pub fn queue_file(&self) -> PathBuf {
        self.root.join("queue.json")
    }

    /// Settings document shared with the UI layer
    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    /// One document per playlist lives here
    pub fn playlists_dir(&self) -> PathBuf {
        self.root.join("playlists")
    }
}
