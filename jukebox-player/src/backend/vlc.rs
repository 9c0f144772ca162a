//! VLC web interface adapter
//!
//! Every command is a GET against `/requests/status.json` with a `command`
//! query parameter; the response body is always the current status document.
//! Authentication is HTTP basic with an empty user name.

use super::{BackendStatus, PlayerBackend};
use crate::config::VlcConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use jukebox_common::events::{BackendKind, PlaybackState};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// VLC's volume scale: 256 is 100%
const VLC_FULL_VOLUME: f32 = 256.0;

/// Grace period before re-reading status after a play request
const PLAY_SETTLE_DELAY: Duration = Duration::from_millis(150);

/// Subset of the status document the adapter reads
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VlcStatus {
    state: String,
    time: f64,
    length: f64,
    information: Option<VlcInformation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VlcInformation {
    category: Option<VlcCategory>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VlcCategory {
    meta: Option<VlcMeta>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VlcMeta {
    filename: Option<String>,
}

impl VlcStatus {
    fn playback_state(&self) -> PlaybackState {
        match self.state.as_str() {
            "playing" => PlaybackState::Playing,
            "paused" => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }

    fn into_backend_status(self) -> BackendStatus {
        let state = self.playback_state();
        let track = self
            .information
            .and_then(|i| i.category)
            .and_then(|c| c.meta)
            .and_then(|m| m.filename);

        BackendStatus {
            state,
            position_seconds: self.time.max(0.0),
            duration_seconds: self.length.max(0.0),
            track,
            degraded: false,
        }
    }
}

/// Adapter for VLC's HTTP interface
pub struct VlcBackend {
    client: Client,
    status_url: String,
    password: String,
    status_timeout: Duration,
}

impl VlcBackend {
    pub fn new(config: &VlcConfig, request_timeout: Duration, status_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            status_url: format!("{}/requests/status.json", config.base_url()),
            password: config.password.clone(),
            status_timeout,
        })
    }

    /// Issue one request; `params` empty means a plain status read
    async fn request(&self, params: &[(&str, String)], timeout: Option<Duration>) -> Result<VlcStatus> {
        let mut builder = self
            .client
            .get(&self.status_url)
            .basic_auth("", Some(&self.password))
            .query(params);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("VLC request timed out: {}", e))
            } else {
                Error::Connection(format!("VLC unreachable: {}", e))
            }
        })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::Connection(format!(
                    "VLC rejected credentials ({})",
                    response.status()
                )));
            }
            status if !status.is_success() => {
                return Err(Error::Connection(format!("VLC returned status {}", status)));
            }
            _ => {}
        }

        response
            .json::<VlcStatus>()
            .await
            .map_err(|e| Error::Connection(format!("Unreadable VLC status: {}", e)))
    }

    async fn command(&self, command: &str, extra: Option<(&str, String)>) -> Result<VlcStatus> {
        let mut params = vec![("command", command.to_string())];
        params.extend(extra);
        debug!(command, "VLC command");
        self.request(&params, None).await
    }
}

#[async_trait]
impl PlayerBackend for VlcBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Controllable
    }

    async fn connect(&self) -> Result<()> {
        self.request(&[], None).await.map(|_| ())
    }

    async fn play(&self, track_path: &str) -> Result<()> {
        // VLC accepts anything and reports failure only through state, so
        // local files are checked up front
        if !track_path.contains("://") && !Path::new(track_path).exists() {
            return Err(Error::Playback(format!("File not found: {}", track_path)));
        }

        let status = self
            .command("in_play", Some(("input", track_path.to_string())))
            .await?;
        if status.playback_state() != PlaybackState::Stopped {
            return Ok(());
        }

        tokio::time::sleep(PLAY_SETTLE_DELAY).await;
        let status = self.request(&[], Some(self.status_timeout)).await?;
        if status.playback_state() == PlaybackState::Stopped {
            return Err(Error::Playback(format!("VLC could not open {}", track_path)));
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.command("pl_forcepause", None).await.map(|_| ())
    }

    async fn resume(&self) -> Result<()> {
        self.command("pl_forceresume", None).await.map(|_| ())
    }

    async fn stop(&self) -> Result<()> {
        self.command("pl_stop", None).await.map(|_| ())
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        let target = seconds.max(0.0).round() as u64;
        self.command("seek", Some(("val", target.to_string())))
            .await
            .map(|_| ())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.command("volume", Some(("val", vlc_volume(volume).to_string())))
            .await
            .map(|_| ())
    }

    async fn get_status(&self) -> BackendStatus {
        match self.request(&[], Some(self.status_timeout)).await {
            Ok(status) => status.into_backend_status(),
            Err(e) => {
                warn!(error = %e, "VLC status poll failed");
                BackendStatus::degraded()
            }
        }
    }
}

/// Convert a 0.0..=1.0 volume to VLC's 0..=256 scale
fn vlc_volume(volume: f32) -> u32 {
    (volume.clamp(0.0, 1.0) * VLC_FULL_VOLUME).round() as u32
}
