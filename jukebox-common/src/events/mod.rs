//! Event types for the jukebox event system
//!
//! Provides shared event definitions and the EventBus used to fan playback,
//! queue, backend and playlist changes out to any number of listeners.

mod playback_types;
mod queue_types;

pub use playback_types::{BackendKind, PlaybackState, RepeatMode};
pub use queue_types::{PlaylistChange, QueueChangeTrigger};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Jukebox event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so the UI
/// layer can forward them verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JukeboxEvent {
    /// Playback state changed (e.g. Playing → Paused)
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// A queue entry started playing on the live backend
    TrackStarted {
        entry_id: Uuid,
        track_path: String,
        backend: BackendKind,
        timestamp: DateTime<Utc>,
    },

    /// A queue entry was skipped after repeated playback failures
    EntrySkipped {
        entry_id: Uuid,
        track_path: String,
        /// Number of failed play attempts before giving up
        attempts: u32,
        /// Last error reported by the backend
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Queue contents or current position changed
    QueueChanged {
        trigger: QueueChangeTrigger,
        queue_length: usize,
        current_index: Option<usize>,
        timestamp: DateTime<Utc>,
    },

    /// Volume or mute state changed
    VolumeChanged {
        volume: f32,
        muted: bool,
        timestamp: DateTime<Utc>,
    },

    /// Live backend changed
    BackendSwitched {
        from: BackendKind,
        to: BackendKind,
        /// Whether the interrupted track was resumed on the new backend
        resumed: bool,
        timestamp: DateTime<Utc>,
    },

    /// A playlist was created, edited or deleted
    PlaylistChanged {
        playlist_id: Uuid,
        change: PlaylistChange,
        timestamp: DateTime<Utc>,
    },

    /// A serialized command failed
    CommandFailed {
        command: String,
        /// Failure classification (e.g. "Busy", "PlaybackError")
        kind: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl JukeboxEvent {
    /// Event type name as it appears in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            JukeboxEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            JukeboxEvent::TrackStarted { .. } => "TrackStarted",
            JukeboxEvent::EntrySkipped { .. } => "EntrySkipped",
            JukeboxEvent::QueueChanged { .. } => "QueueChanged",
            JukeboxEvent::VolumeChanged { .. } => "VolumeChanged",
            JukeboxEvent::BackendSwitched { .. } => "BackendSwitched",
            JukeboxEvent::PlaylistChanged { .. } => "PlaylistChanged",
            JukeboxEvent::CommandFailed { .. } => "CommandFailed",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally: publishing never blocks, slow subscribers
/// observe `Lagged` instead of stalling producers, and receivers clean up when
/// dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<JukeboxEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<JukeboxEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: JukeboxEvent,
    ) -> Result<usize, broadcast::error::SendError<JukeboxEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: JukeboxEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
