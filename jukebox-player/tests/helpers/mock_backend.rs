//! Scripted in-process backend
//!
//! Records every call and lets tests inject the failures real players produce:
//! rejected tracks, dropped connections, unreachable processes and slow calls.

use async_trait::async_trait;
use jukebox_common::events::{BackendKind, PlaybackState};
use jukebox_player::backend::{BackendFactory, BackendStatus, PlayerBackend};
use jukebox_player::{Error, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect,
    Play(String),
    Pause,
    Resume,
    Stop,
    Seek(f64),
    SetVolume(f32),
    Status,
}

#[derive(Debug, Default)]
struct Script {
    state: PlaybackState,
    track: Option<String>,
    position: f64,
    duration: f64,
    unreachable: bool,
    degraded: bool,
    /// Remaining control calls that fail with a connection error
    connection_drops: u32,
    rejected: HashSet<String>,
    play_delay: Duration,
    connect_delay: Duration,
}

pub struct MockBackend {
    kind: BackendKind,
    calls: Mutex<Vec<Call>>,
    script: Mutex<Script>,
}

impl MockBackend {
    pub fn new(kind: BackendKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(Script::default()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Tracks passed to `play`, in order
    pub fn plays(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Play(track) => Some(track),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn reject_track(&self, track: &str) {
        self.script.lock().unwrap().rejected.insert(track.to_string());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.script.lock().unwrap().unreachable = unreachable;
    }

    pub fn set_degraded(&self, degraded: bool) {
        self.script.lock().unwrap().degraded = degraded;
    }

    /// Fail the next `n` control calls with a connection error
    pub fn drop_connection(&self, n: u32) {
        self.script.lock().unwrap().connection_drops = n;
    }

    pub fn set_play_delay(&self, delay: Duration) {
        self.script.lock().unwrap().play_delay = delay;
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        self.script.lock().unwrap().connect_delay = delay;
    }

    pub fn set_position(&self, seconds: f64) {
        self.script.lock().unwrap().position = seconds;
    }

    /// Simulate the current track reaching its end
    pub fn finish_track(&self) {
        let mut script = self.script.lock().unwrap();
        script.state = PlaybackState::Stopped;
        script.position = 0.0;
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Shared failure gate for control calls
    fn gate(&self) -> Result<()> {
        let mut script = self.script.lock().unwrap();
        if script.unreachable {
            return Err(Error::Connection(format!("{} unreachable", self.kind)));
        }
        if script.connection_drops > 0 {
            script.connection_drops -= 1;
            return Err(Error::Connection(format!("{} connection reset", self.kind)));
        }
        Ok(())
    }

    fn set_state(&self, state: PlaybackState) {
        self.script.lock().unwrap().state = state;
    }
}

#[async_trait]
impl PlayerBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn connect(&self) -> Result<()> {
        self.record(Call::Connect);
        let (delay, unreachable) = {
            let script = self.script.lock().unwrap();
            (script.connect_delay, script.unreachable)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if unreachable {
            return Err(Error::Connection(format!("{} refused connection", self.kind)));
        }
        Ok(())
    }

    async fn play(&self, track_path: &str) -> Result<()> {
        self.record(Call::Play(track_path.to_string()));
        let delay = self.script.lock().unwrap().play_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.gate()?;

        let mut script = self.script.lock().unwrap();
        if script.rejected.contains(track_path) {
            return Err(Error::Playback(format!("cannot decode {}", track_path)));
        }
        script.state = PlaybackState::Playing;
        script.track = Some(track_path.to_string());
        script.position = 0.0;
        script.duration = 180.0;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(Call::Pause);
        self.gate()?;
        self.set_state(PlaybackState::Paused);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.record(Call::Resume);
        self.gate()?;
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record(Call::Stop);
        self.gate()?;
        self.set_state(PlaybackState::Stopped);
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        self.record(Call::Seek(seconds));
        self.gate()?;
        self.script.lock().unwrap().position = seconds;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.record(Call::SetVolume(volume));
        self.gate()
    }

    async fn get_status(&self) -> BackendStatus {
        self.record(Call::Status);
        let script = self.script.lock().unwrap();
        if script.unreachable || script.degraded {
            return BackendStatus::degraded();
        }
        BackendStatus {
            state: script.state,
            position_seconds: script.position,
            duration_seconds: script.duration,
            track: script.track.clone(),
            degraded: false,
        }
    }
}

/// Factory handing out one shared mock per kind
pub struct MockFactory {
    vlc: Arc<MockBackend>,
    mpd: Arc<MockBackend>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self {
            vlc: MockBackend::new(BackendKind::Controllable),
            mpd: MockBackend::new(BackendKind::Daemon),
        }
    }

    pub fn vlc(&self) -> Arc<MockBackend> {
        Arc::clone(&self.vlc)
    }

    pub fn mpd(&self) -> Arc<MockBackend> {
        Arc::clone(&self.mpd)
    }
}

impl BackendFactory for MockFactory {
    fn create(&self, kind: BackendKind) -> Result<Arc<dyn PlayerBackend>> {
        let backend: Arc<dyn PlayerBackend> = match kind {
            BackendKind::Controllable => self.vlc(),
            BackendKind::Daemon => self.mpd(),
        };
        Ok(backend)
    }
}
