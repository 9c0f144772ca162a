//! # Jukebox Player Library (jukebox-player)
//!
//! Playback queue and audio backend controller for a self-hosted jukebox.
//!
//! **Purpose:** Own the play queue and playlists, drive one of two external
//! player processes (VLC over HTTP, MPD over TCP), and hot-switch between them
//! without losing queue state.
//!
//! **Architecture:** A single controller task serializes every playback
//! command; status is published through a watch channel; all state lives in
//! JSON documents under the data folder.

pub mod backend;
pub mod config;
pub mod error;
pub mod playback;
pub mod playlist;
pub mod queue;
pub mod settings;

pub use error::{Error, ErrorKind, Outcome, Result};
pub use playback::{PlaybackController, PlaybackStatus};
pub use playlist::{Playlist, PlaylistManager, PlaylistTrack};
pub use queue::{QueueEntry, QueueState};

use backend::{BackendFactory, DefaultBackendFactory};
use config::{DataPaths, PlayerConfig};
use jukebox_common::EventBus;
use settings::SettingsStore;
use std::sync::Arc;

/// Capacity of the event broadcast channel
const EVENT_CAPACITY: usize = 256;

/// Fully wired jukebox core
#[derive(Clone)]
pub struct Jukebox {
    pub controller: PlaybackController,
    pub playlists: Arc<PlaylistManager>,
    pub settings: Arc<SettingsStore>,
    pub events: EventBus,
}

impl Jukebox {
    /// Start with the real VLC/MPD adapters
    pub async fn start(config: &PlayerConfig, paths: DataPaths) -> Result<Self> {
        let factory = Arc::new(DefaultBackendFactory::new(
            config.vlc.clone(),
            config.mpd.clone(),
            config.timing.clone(),
        ));
        Self::start_with_factory(config, paths, factory).await
    }

    /// Start with a caller-supplied backend factory
    pub async fn start_with_factory(
        config: &PlayerConfig,
        paths: DataPaths,
        factory: Arc<dyn BackendFactory>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(paths.root()).await?;

        let events = EventBus::new(EVENT_CAPACITY);
        let settings = Arc::new(SettingsStore::new(paths.settings_file()));
        let playlists = Arc::new(
            PlaylistManager::open(paths.playlists_dir(), Arc::clone(&settings), events.clone())
                .await?,
        );
        let controller = PlaybackController::start(
            &paths,
            config.timing.clone(),
            factory,
            Arc::clone(&settings),
            events.clone(),
        )
        .await?;

        Ok(Self {
            controller,
            playlists,
            settings,
            events,
        })
    }

    /// Append every track of a playlist to the queue
    pub async fn enqueue_playlist(&self, playlist_id: uuid::Uuid) -> Result<PlaybackStatus> {
        let entries = self.playlists.queue_entries(playlist_id).await?;
        self.controller.enqueue_all(entries).await
    }
}
