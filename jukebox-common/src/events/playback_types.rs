//! Playback-related type definitions
//!
//! Supporting types for playback state, repeat policy and backend selection.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Playback state enumeration
///
/// `Transitioning` is only ever observed while a backend switch or an
/// adapter command is in flight; it is never a stable resting state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
    Transitioning,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Transitioning => write!(f, "transitioning"),
        }
    }
}

/// Which external player process is driven
///
/// The settings document historically stores `"vlc"` / `"mpd"`; both spellings
/// are accepted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// HTTP-controllable player (VLC web interface)
    #[default]
    #[serde(alias = "vlc")]
    Controllable,
    /// Daemon player speaking the MPD line protocol
    #[serde(alias = "mpd")]
    Daemon,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Controllable => write!(f, "controllable"),
            BackendKind::Daemon => write!(f, "daemon"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "controllable" | "vlc" => Ok(BackendKind::Controllable),
            "daemon" | "mpd" => Ok(BackendKind::Daemon),
            other => Err(format!("Unknown audio player '{}'", other)),
        }
    }
}

/// Queue repeat policy applied when advancing
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after the last entry
    #[default]
    Off,
    /// Replay the current entry
    One,
    /// Wrap to the first entry after the last
    All,
}

impl std::fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepeatMode::Off => write!(f, "off"),
            RepeatMode::One => write!(f, "one"),
            RepeatMode::All => write!(f, "all"),
        }
    }
}

impl FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(RepeatMode::Off),
            "one" | "track" => Ok(RepeatMode::One),
            "all" | "queue" => Ok(RepeatMode::All),
            other => Err(format!("Unknown repeat mode '{}'", other)),
        }
    }
}
