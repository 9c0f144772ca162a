//! Queue data model
//!
//! `QueueState` is the persisted snapshot. All index bookkeeping lives here as
//! plain synchronous operations; persistence and play-order tracking are layered
//! on top by [`super::QueueStore`].

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use jukebox_common::events::{BackendKind, RepeatMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Default volume for a fresh queue
pub const DEFAULT_VOLUME: f32 = 0.75;

/// One queued track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: Uuid,
    pub track_path: String,
    pub title: String,
    pub added_at: DateTime<Utc>,
}

impl QueueEntry {
    /// New entry with a fresh id; the title defaults to the file stem
    pub fn new(track_path: impl Into<String>, title: Option<String>) -> Self {
        let track_path = track_path.into();
        let title = title.unwrap_or_else(|| {
            Path::new(&track_path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| track_path.clone())
        });

        Self {
            id: Uuid::new_v4(),
            track_path,
            title,
            added_at: Utc::now(),
        }
    }
}

/// Persisted queue snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueState {
    pub entries: Vec<QueueEntry>,
    pub current_index: Option<usize>,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
    pub volume: f32,
    pub muted: bool,
    pub active_backend: BackendKind,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            current_index: None,
            repeat_mode: RepeatMode::Off,
            shuffle: false,
            volume: DEFAULT_VOLUME,
            muted: false,
            active_backend: BackendKind::default(),
        }
    }
}

impl QueueState {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_entry(&self) -> Option<&QueueEntry> {
        self.current_index.and_then(|i| self.entries.get(i))
    }

    pub fn position_of(&self, id: Uuid) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Volume actually sent to the backend
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Repair a loaded snapshot; returns true when anything changed
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;

        if matches!(self.current_index, Some(i) if i >= self.entries.len()) {
            self.current_index = None;
            changed = true;
        }

        let volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            DEFAULT_VOLUME
        };
        if volume != self.volume {
            self.volume = volume;
            changed = true;
        }

        changed
    }

    pub fn append(&mut self, entry: QueueEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Insert at `index` (clamped to the end), keeping the current entry current
    pub fn insert_at(&mut self, index: usize, entry: QueueEntry) -> usize {
        let index = index.min(self.entries.len());
        self.entries.insert(index, entry);
        if let Some(current) = self.current_index {
            if index <= current {
                self.current_index = Some(current + 1);
            }
        }
        index
    }

    /// Remove by index
    ///
    /// Removing the current entry makes its successor current, or clears the
    /// pointer when it was the last entry.
    pub fn remove_at(&mut self, index: usize) -> Result<QueueEntry> {
        self.check_index(index)?;
        let removed = self.entries.remove(index);

        self.current_index = match self.current_index {
            Some(current) if index < current => Some(current - 1),
            Some(current) if index == current => (index < self.entries.len()).then_some(index),
            other => other,
        };
        Ok(removed)
    }

    /// Move the entry at `from` so it ends up at `to`
    pub fn move_to(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }

        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);

        if let Some(current) = self.current_index {
            self.current_index = Some(if current == from {
                to
            } else if from < current && to >= current {
                current - 1
            } else if from > current && to <= current {
                current + 1
            } else {
                current
            });
        }
        Ok(())
    }

    pub fn set_current_index(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(i) = index {
            self.check_index(i)?;
        }
        self.current_index = index;
        Ok(())
    }

    /// Next index in queue order under `repeat`
    pub fn linear_successor(&self, repeat: RepeatMode) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        match self.current_index {
            None => Some(0),
            Some(current) if current + 1 < self.entries.len() => Some(current + 1),
            Some(_) if repeat == RepeatMode::All => Some(0),
            Some(_) => None,
        }
    }

    /// Previous index in queue order
    ///
    /// From the first entry this wraps under repeat-all and otherwise restarts
    /// the first entry. With no current entry it lands on the last one.
    pub fn linear_predecessor(&self) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        match self.current_index {
            None => Some(self.entries.len() - 1),
            Some(0) if self.repeat_mode == RepeatMode::All => Some(self.entries.len() - 1),
            Some(0) => Some(0),
            Some(current) => Some(current - 1),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_index = None;
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(Error::NotFound(format!(
                "Queue index {} out of range (length {})",
                index,
                self.entries.len()
            )))
        }
    }
}
