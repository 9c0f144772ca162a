//! External player backends
//!
//! Two concrete adapters sit behind one [`PlayerBackend`] contract:
//! - [`vlc::VlcBackend`]: VLC web interface (HTTP request/response)
//! - [`mpd::MpdBackend`]: MPD daemon (line-oriented TCP protocol)
//!
//! Adapters translate commands into the backend protocol and classify failures.
//! They never retry; retry policy belongs to the switcher and controller.

pub mod mpd;
pub mod switcher;
pub mod vlc;

use crate::config::{MpdConfig, TimingConfig, VlcConfig};
use crate::error::Result;
use async_trait::async_trait;
use jukebox_common::events::{BackendKind, PlaybackState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use switcher::{BackendSwitcher, ResumePoint, SwitchPermit, SwitchPolicy, SwitchReport, SwitchRequest};

/// Status snapshot reported by a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub state: PlaybackState,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    /// Track the backend believes it is playing, when it reports one
    pub track: Option<String>,
    /// Set when the status poll itself failed
    pub degraded: bool,
}

impl BackendStatus {
    /// Result of a failed poll: stopped, flagged degraded
    pub fn degraded() -> Self {
        Self {
            state: PlaybackState::Stopped,
            degraded: true,
            ..Default::default()
        }
    }
}

/// Uniform command surface over one external player process
#[async_trait]
pub trait PlayerBackend: Send + Sync {
    /// Which kind of player this adapter drives
    fn kind(&self) -> BackendKind;

    /// Establish (or re-establish) the control channel
    ///
    /// Fails with `Error::Connection` when the process is unreachable.
    async fn connect(&self) -> Result<()>;

    /// Replace whatever is playing with `track_path` and start it
    ///
    /// Fails with `Error::Playback` when the player rejects the track.
    async fn play(&self, track_path: &str) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn seek(&self, seconds: f64) -> Result<()>;

    /// Volume on a 0.0..=1.0 scale
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Bounded status poll; never fails, see [`BackendStatus::degraded`]
    async fn get_status(&self) -> BackendStatus;
}

/// Instantiates adapters on demand (startup and backend switches)
pub trait BackendFactory: Send + Sync {
    fn create(&self, kind: BackendKind) -> Result<Arc<dyn PlayerBackend>>;
}

/// Factory building the real adapters from bootstrap configuration
pub struct DefaultBackendFactory {
    vlc: VlcConfig,
    mpd: MpdConfig,
    timing: TimingConfig,
}

impl DefaultBackendFactory {
    pub fn new(vlc: VlcConfig, mpd: MpdConfig, timing: TimingConfig) -> Self {
        Self { vlc, mpd, timing }
    }
}

impl BackendFactory for DefaultBackendFactory {
    fn create(&self, kind: BackendKind) -> Result<Arc<dyn PlayerBackend>> {
        let backend: Arc<dyn PlayerBackend> = match kind {
            BackendKind::Controllable => Arc::new(vlc::VlcBackend::new(
                &self.vlc,
                self.timing.connect_timeout(),
                self.timing.status_timeout(),
            )?),
            BackendKind::Daemon => Arc::new(mpd::MpdBackend::new(
                &self.mpd,
                self.timing.connect_timeout(),
                self.timing.status_timeout(),
            )),
        };
        Ok(backend)
    }
}
