//! Playlist management
//!
//! Each playlist is one JSON document under the playlists folder, named by
//! playlist id. Every write is checked against the access policy before
//! anything changes, and track positions stay contiguous from 0.

use crate::error::{Error, Result};
use crate::queue::QueueEntry;
use crate::settings::{PolicyAction, SettingsStore};
use chrono::{DateTime, Utc};
use jukebox_common::events::PlaylistChange;
use jukebox_common::time::now;
use jukebox_common::{EventBus, JsonDocument, JukeboxEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistTrack {
    pub id: Uuid,
    pub track_path: String,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub tracks: Vec<PlaylistTrack>,
    pub track_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    fn new(name: String) -> Self {
        let created_at = now();
        Self {
            id: Uuid::new_v4(),
            name,
            tracks: Vec::new(),
            track_count: 0,
            created_at,
            updated_at: created_at,
        }
    }

    /// Rewrite positions as 0..n in vector order and refresh the count
    fn renumber(&mut self) {
        for (position, track) in self.tracks.iter_mut().enumerate() {
            track.position = position;
        }
        self.track_count = self.tracks.len();
    }

    fn touch(&mut self) {
        self.renumber();
        self.updated_at = now();
    }

    fn track_index(&self, track_id: Uuid) -> Result<usize> {
        self.tracks
            .iter()
            .position(|t| t.id == track_id)
            .ok_or_else(|| {
                Error::NotFound(format!("Track {} not in playlist {}", track_id, self.id))
            })
    }

    /// Positions are exactly 0..n in order
    pub fn is_contiguous(&self) -> bool {
        self.track_count == self.tracks.len()
            && self
                .tracks
                .iter()
                .enumerate()
                .all(|(i, t)| t.position == i)
    }
}

pub struct PlaylistManager {
    dir: PathBuf,
    settings: Arc<SettingsStore>,
    events: EventBus,
    playlists: Mutex<BTreeMap<Uuid, Playlist>>,
}

impl PlaylistManager {
    /// Load every playlist document in `dir`
    ///
    /// Unreadable documents are skipped with a warning; documents with gaps
    /// in their positions are repaired in memory.
    pub async fn open(
        dir: impl Into<PathBuf>,
        settings: Arc<SettingsStore>,
        events: EventBus,
    ) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut playlists = BTreeMap::new();
        let mut reader = tokio::fs::read_dir(&dir).await?;
        while let Some(item) = reader.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match JsonDocument::<Playlist>::new(&path).load().await {
                Ok(Some(mut playlist)) => {
                    if !playlist.is_contiguous() {
                        warn!(playlist_id = %playlist.id, "Renumbering playlist positions");
                        playlist.renumber();
                    }
                    playlists.insert(playlist.id, playlist);
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable playlist"),
            }
        }

        info!(count = playlists.len(), dir = %dir.display(), "Playlists loaded");
        Ok(Self {
            dir,
            settings,
            events,
            playlists: Mutex::new(playlists),
        })
    }

    /// All playlists, ordered by creation time
    pub async fn list_playlists(&self) -> Vec<Playlist> {
        let mut playlists: Vec<Playlist> = self.playlists.lock().await.values().cloned().collect();
        playlists.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        playlists
    }

    pub async fn get_playlist(&self, id: Uuid) -> Result<Playlist> {
        self.playlists
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    pub async fn create_playlist(&self, name: &str) -> Result<Playlist> {
        self.authorize().await?;
        let name = validate_name(name)?;

        let mut playlists = self.playlists.lock().await;
        let playlist = Playlist::new(name);
        self.document(playlist.id).save(&playlist).await?;
        playlists.insert(playlist.id, playlist.clone());
        drop(playlists);

        info!(playlist_id = %playlist.id, name = %playlist.name, "Playlist created");
        self.changed(playlist.id, PlaylistChange::Created);
        Ok(playlist)
    }

    pub async fn rename_playlist(&self, id: Uuid, name: &str) -> Result<Playlist> {
        self.authorize().await?;
        let name = validate_name(name)?;
        self.edit(id, PlaylistChange::Renamed, |playlist| {
            playlist.name = name;
            Ok(())
        })
        .await
    }

    pub async fn delete_playlist(&self, id: Uuid) -> Result<()> {
        self.authorize().await?;

        let mut playlists = self.playlists.lock().await;
        if !playlists.contains_key(&id) {
            return Err(not_found(id));
        }
        self.document(id).remove().await?;
        playlists.remove(&id);
        drop(playlists);

        info!(playlist_id = %id, "Playlist deleted");
        self.changed(id, PlaylistChange::Deleted);
        Ok(())
    }

    /// Append a track at the end of the playlist
    pub async fn add_track(&self, playlist_id: Uuid, track_path: &str) -> Result<PlaylistTrack> {
        self.authorize().await?;
        if track_path.trim().is_empty() {
            return Err(Error::InvalidInput("Track path must not be empty".to_string()));
        }

        let track = PlaylistTrack {
            id: Uuid::new_v4(),
            track_path: track_path.to_string(),
            position: 0,
        };
        let playlist = self
            .edit(playlist_id, PlaylistChange::TrackAdded, |playlist| {
                playlist.tracks.push(track.clone());
                Ok(())
            })
            .await?;

        playlist
            .tracks
            .last()
            .cloned()
            .ok_or_else(|| Error::Internal("Added track missing from playlist".to_string()))
    }

    /// Remove a track; later tracks move up one position
    pub async fn remove_track(&self, playlist_id: Uuid, track_id: Uuid) -> Result<Playlist> {
        self.authorize().await?;
        self.edit(playlist_id, PlaylistChange::TrackRemoved, |playlist| {
            let index = playlist.track_index(track_id)?;
            playlist.tracks.remove(index);
            Ok(())
        })
        .await
    }

    /// Move a track to `new_position`, clamped to the last position
    pub async fn reorder(
        &self,
        playlist_id: Uuid,
        track_id: Uuid,
        new_position: usize,
    ) -> Result<Playlist> {
        self.authorize().await?;
        self.edit(playlist_id, PlaylistChange::Reordered, |playlist| {
            let index = playlist.track_index(track_id)?;
            let track = playlist.tracks.remove(index);
            let target = new_position.min(playlist.tracks.len());
            playlist.tracks.insert(target, track);
            Ok(())
        })
        .await
    }

    /// Fresh queue entries for every track, in playlist order
    pub async fn queue_entries(&self, id: Uuid) -> Result<Vec<QueueEntry>> {
        let playlist = self.get_playlist(id).await?;
        Ok(playlist
            .tracks
            .iter()
            .map(|t| QueueEntry::new(t.track_path.clone(), None))
            .collect())
    }

    async fn authorize(&self) -> Result<()> {
        let policy = self.settings.access_policy().await?;
        policy.check(PolicyAction::Edit).map_err(|e| {
            warn!(error = %e, "Playlist write denied");
            e
        })
    }

    /// Apply `mutate` to a copy, persist it, then publish it
    async fn edit(
        &self,
        id: Uuid,
        change: PlaylistChange,
        mutate: impl FnOnce(&mut Playlist) -> Result<()>,
    ) -> Result<Playlist> {
        let mut playlists = self.playlists.lock().await;
        let mut playlist = playlists.get(&id).cloned().ok_or_else(|| not_found(id))?;

        mutate(&mut playlist)?;
        playlist.touch();
        self.document(id).save(&playlist).await?;
        playlists.insert(id, playlist.clone());
        drop(playlists);

        self.changed(id, change);
        Ok(playlist)
    }

    fn document(&self, id: Uuid) -> JsonDocument<Playlist> {
        JsonDocument::new(self.dir.join(format!("{}.json", id)))
    }

    fn changed(&self, playlist_id: Uuid, change: PlaylistChange) {
        self.events.emit_lossy(JukeboxEvent::PlaylistChanged {
            playlist_id,
            change,
            timestamp: now(),
        });
    }
}

fn not_found(id: Uuid) -> Error {
    Error::NotFound(format!("Playlist {} not found", id))
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        Err(Error::InvalidInput("Playlist name must not be empty".to_string()))
    } else {
        Ok(name.to_string())
    }
}
