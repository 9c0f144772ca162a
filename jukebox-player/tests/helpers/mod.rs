//! Test helper modules for jukebox-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - MockBackend / MockFactory: scripted in-process player backends
//! - Harness: a fully wired core over a temporary data folder
//! - FakeMpd / FakeVlc: loopback servers speaking the real wire protocols

#![allow(dead_code)]

pub mod fake_mpd;
pub mod fake_vlc;
pub mod mock_backend;

pub use fake_mpd::FakeMpd;
pub use fake_vlc::FakeVlc;
pub use mock_backend::{Call, MockBackend, MockFactory};

use jukebox_common::events::{JukeboxEvent, PlaybackState};
use jukebox_player::config::{DataPaths, PlayerConfig, TimingConfig};
use jukebox_player::{Jukebox, PlaybackStatus, QueueEntry};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Timing tuned for tests: short bounds, fast backoff, no background polling
pub fn test_timing() -> TimingConfig {
    TimingConfig {
        command_timeout_ms: 2000,
        switch_timeout_ms: 3000,
        status_timeout_ms: 200,
        connect_timeout_ms: 200,
        connect_attempts: 3,
        connect_backoff_ms: 10,
        play_retry_limit: 2,
        status_poll_interval_ms: 0,
    }
}

pub fn test_config() -> PlayerConfig {
    PlayerConfig {
        timing: test_timing(),
        ..Default::default()
    }
}

/// Core wired to mock backends over a temporary data folder
pub struct Harness {
    pub dir: TempDir,
    pub jukebox: Jukebox,
    pub vlc: Arc<MockBackend>,
    pub mpd: Arc<MockBackend>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(test_config()).await
    }

    pub async fn start_with(config: PlayerConfig) -> Self {
        Self::start_in(TempDir::new().unwrap(), config).await
    }

    /// Start over an existing folder, e.g. one prepared with settings
    pub async fn start_in(dir: TempDir, config: PlayerConfig) -> Self {
        let factory = MockFactory::new();
        Self::start_with_factory(dir, config, factory).await
    }

    pub async fn start_with_factory(dir: TempDir, config: PlayerConfig, factory: MockFactory) -> Self {
        let vlc = factory.vlc();
        let mpd = factory.mpd();
        let jukebox = Jukebox::start_with_factory(&config, DataPaths::new(dir.path()), Arc::new(factory))
            .await
            .unwrap();
        Self {
            dir,
            jukebox,
            vlc,
            mpd,
        }
    }

    pub fn paths(&self) -> DataPaths {
        DataPaths::new(self.dir.path())
    }

    pub fn status(&self) -> PlaybackStatus {
        self.jukebox.controller.get_status()
    }

    /// Poll status until `predicate` holds or the deadline passes
    pub async fn wait_for(&self, predicate: impl Fn(&PlaybackStatus) -> bool) -> PlaybackStatus {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        loop {
            let status = self.status();
            if predicate(&status) || tokio::time::Instant::now() >= deadline {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

pub fn entry(name: &str) -> QueueEntry {
    QueueEntry::new(track(name), None)
}

pub fn track(name: &str) -> String {
    format!("/music/{}.mp3", name)
}

/// Write the settings document before the core starts
pub fn write_settings(dir: &TempDir, settings: serde_json::Value) {
    std::fs::write(
        dir.path().join("settings.json"),
        serde_json::to_vec_pretty(&settings).unwrap(),
    )
    .unwrap();
}

pub fn read_settings(dir: &TempDir) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(dir.path().join("settings.json")).unwrap()).unwrap()
}

/// Drain every event currently buffered on `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<JukeboxEvent>) -> Vec<JukeboxEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn is_active(status: &PlaybackStatus) -> bool {
    matches!(status.state, PlaybackState::Playing | PlaybackState::Paused)
}
