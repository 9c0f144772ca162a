//! Published playback status
//!
//! The controller task is the only writer. Readers take a snapshot from the
//! watch channel and never wait on the command queue.

use crate::queue::{QueueEntry, QueueState};
use jukebox_common::events::{BackendKind, PlaybackState, RepeatMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Status snapshot returned by `get_status` and by every command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub current_entry: Option<QueueEntry>,
    pub current_index: Option<usize>,
    pub queue_length: usize,
    pub volume: f32,
    pub muted: bool,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
    pub active_backend: BackendKind,
    /// Last backend poll failed; state may be stale
    pub degraded: bool,
}

impl PlaybackStatus {
    /// Stopped status mirroring a queue snapshot
    pub fn from_queue(queue: &QueueState) -> Self {
        let mut status = Self {
            state: PlaybackState::Stopped,
            position_seconds: 0.0,
            duration_seconds: 0.0,
            current_entry: None,
            current_index: None,
            queue_length: 0,
            volume: queue.volume,
            muted: queue.muted,
            repeat_mode: queue.repeat_mode,
            shuffle: queue.shuffle,
            active_backend: queue.active_backend,
            degraded: false,
        };
        status.mirror_queue(queue);
        status
    }

    /// Copy the queue-derived fields
    pub fn mirror_queue(&mut self, queue: &QueueState) {
        self.current_entry = queue.current_entry().cloned();
        self.current_index = queue.current_index;
        self.queue_length = queue.len();
        self.volume = queue.volume;
        self.muted = queue.muted;
        self.repeat_mode = queue.repeat_mode;
        self.shuffle = queue.shuffle;
        self.active_backend = queue.active_backend;
    }
}

#[derive(Debug, Clone)]
struct StatusCell {
    stable: PlaybackStatus,
    queue: Arc<QueueState>,
    transitions: u32,
}

/// Shared handle to the published status
#[derive(Clone)]
pub struct StatusHandle {
    tx: Arc<watch::Sender<StatusCell>>,
}

impl StatusHandle {
    pub fn new(queue: &QueueState) -> Self {
        let (tx, _) = watch::channel(StatusCell {
            stable: PlaybackStatus::from_queue(queue),
            queue: Arc::new(queue.clone()),
            transitions: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    /// What callers see: `Transitioning` while any transition is open
    pub fn snapshot(&self) -> PlaybackStatus {
        let cell = self.tx.borrow();
        let mut status = cell.stable.clone();
        if cell.transitions > 0 {
            status.state = PlaybackState::Transitioning;
        }
        status
    }

    /// Status ignoring open transitions
    pub fn stable(&self) -> PlaybackStatus {
        self.tx.borrow().stable.clone()
    }

    pub fn queue(&self) -> Arc<QueueState> {
        Arc::clone(&self.tx.borrow().queue)
    }

    pub fn is_transitioning(&self) -> bool {
        self.tx.borrow().transitions > 0
    }

    pub fn update(&self, f: impl FnOnce(&mut PlaybackStatus)) {
        self.tx.send_modify(|cell| f(&mut cell.stable));
    }

    /// Republish queue-derived fields after a queue mutation
    pub fn publish_queue(&self, queue: &QueueState) {
        self.tx.send_modify(|cell| {
            cell.stable.mirror_queue(queue);
            cell.queue = Arc::new(queue.clone());
        });
    }

    /// Report `Transitioning` until the guard drops
    pub fn begin_transition(&self) -> TransitionGuard {
        self.tx.send_modify(|cell| cell.transitions += 1);
        TransitionGuard {
            tx: Arc::clone(&self.tx),
        }
    }
}

/// Closes one transition on drop, including on error and timeout paths
pub struct TransitionGuard {
    tx: Arc<watch::Sender<StatusCell>>,
}

impl Drop for TransitionGuard {
    fn drop(&mut self) {
        self.tx
            .send_modify(|cell| cell.transitions = cell.transitions.saturating_sub(1));
    }
}
