//! Queue and playlist change type definitions

use serde::{Deserialize, Serialize};

/// Why the queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    UserEnqueue,
    UserDequeue,
    UserReorder,
    UserClear,
    PlayNow,
    Skip,
    TrackCompletion,
    AutoSkip,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::UserEnqueue => write!(f, "UserEnqueue"),
            QueueChangeTrigger::UserDequeue => write!(f, "UserDequeue"),
            QueueChangeTrigger::UserReorder => write!(f, "UserReorder"),
            QueueChangeTrigger::UserClear => write!(f, "UserClear"),
            QueueChangeTrigger::PlayNow => write!(f, "PlayNow"),
            QueueChangeTrigger::Skip => write!(f, "Skip"),
            QueueChangeTrigger::TrackCompletion => write!(f, "TrackCompletion"),
            QueueChangeTrigger::AutoSkip => write!(f, "AutoSkip"),
        }
    }
}

/// What happened to a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PlaylistChange {
    Created,
    Renamed,
    Deleted,
    TrackAdded,
    TrackRemoved,
    Reordered,
}

impl std::fmt::Display for PlaylistChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaylistChange::Created => write!(f, "Created"),
            PlaylistChange::Renamed => write!(f, "Renamed"),
            PlaylistChange::Deleted => write!(f, "Deleted"),
            PlaylistChange::TrackAdded => write!(f, "TrackAdded"),
            PlaylistChange::TrackRemoved => write!(f, "TrackRemoved"),
            PlaylistChange::Reordered => write!(f, "Reordered"),
        }
    }
}
