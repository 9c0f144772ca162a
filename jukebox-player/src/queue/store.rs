//! Persisted queue store
//!
//! Every mutation runs against a scratch copy of the state, the copy is saved,
//! and only then does it replace the in-memory state. A failed save leaves the
//! store exactly as it was.

use super::state::{QueueEntry, QueueState};
use crate::error::{Error, Result};
use jukebox_common::events::{BackendKind, RepeatMode};
use jukebox_common::JsonDocument;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Cap on remembered play history
const MAX_HISTORY: usize = 500;

/// Play-order bookkeeping that is not persisted
///
/// Tracked by entry id so it survives reorders and removals.
#[derive(Debug, Clone, Default)]
struct PlayTracking {
    /// Entries played during the current shuffle pass
    visited: HashSet<Uuid>,
    /// Previously current entries, most recent last
    history: Vec<Uuid>,
}

impl PlayTracking {
    fn reset(&mut self) {
        self.visited.clear();
        self.history.clear();
    }
}

/// Ordered queue with a current-entry pointer, backed by a JSON document
pub struct QueueStore {
    state: QueueState,
    tracking: PlayTracking,
    doc: JsonDocument<QueueState>,
    rng: StdRng,
}

impl QueueStore {
    /// Load the snapshot at `path`, or start empty if none exists
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let doc: JsonDocument<QueueState> = JsonDocument::new(path);
        let mut state = doc.load_or_default().await?;

        if state.normalize() {
            warn!(path = %doc.path().display(), "Repaired inconsistent queue snapshot");
            doc.save(&state).await?;
        }

        info!(
            entries = state.len(),
            current_index = ?state.current_index,
            "Queue loaded"
        );

        let mut tracking = PlayTracking::default();
        if let Some(entry) = state.current_entry() {
            tracking.visited.insert(entry.id);
        }

        Ok(Self {
            state,
            tracking,
            doc,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn state(&self) -> &QueueState {
        &self.state
    }

    pub fn current_entry(&self) -> Option<&QueueEntry> {
        self.state.current_entry()
    }

    pub async fn append(&mut self, entry: QueueEntry) -> Result<usize> {
        self.commit(|state, _, _| Ok(state.append(entry))).await
    }

    /// Append several entries in order; returns the new queue length
    pub async fn append_all(&mut self, entries: Vec<QueueEntry>) -> Result<usize> {
        self.commit(|state, _, _| {
            state.entries.extend(entries);
            Ok(state.len())
        })
        .await
    }

    /// Insert right after the current entry (or at the end with none current)
    pub async fn insert_next(&mut self, entry: QueueEntry) -> Result<usize> {
        self.commit(|state, _, _| {
            let index = state.current_index.map_or(state.len(), |c| c + 1);
            Ok(state.insert_at(index, entry))
        })
        .await
    }

    pub async fn remove_at(&mut self, index: usize) -> Result<QueueEntry> {
        self.commit(|state, tracking, _| {
            let removed = state.remove_at(index)?;
            tracking.visited.remove(&removed.id);
            tracking.history.retain(|id| *id != removed.id);
            if let Some(entry) = state.current_entry() {
                tracking.visited.insert(entry.id);
            }
            Ok(removed)
        })
        .await
    }

    pub async fn remove_by_id(&mut self, id: Uuid) -> Result<QueueEntry> {
        let index = self
            .state
            .position_of(id)
            .ok_or_else(|| Error::NotFound(format!("Queue entry {} not found", id)))?;
        self.remove_at(index).await
    }

    pub async fn move_to(&mut self, from: usize, to: usize) -> Result<()> {
        self.commit(|state, _, _| state.move_to(from, to)).await
    }

    pub async fn set_current_index(&mut self, index: Option<usize>) -> Result<()> {
        self.commit(|state, tracking, _| move_cursor(state, tracking, index))
            .await
    }

    /// Step forward per repeat and shuffle; `None` means playback ran off the end
    pub async fn advance(&mut self) -> Result<Option<usize>> {
        let repeat = self.state.repeat_mode;
        self.advance_with(repeat).await
    }

    /// Step past the current entry even under repeat-one
    pub async fn skip_past_current(&mut self) -> Result<Option<usize>> {
        let repeat = match self.state.repeat_mode {
            RepeatMode::One => RepeatMode::Off,
            other => other,
        };
        self.advance_with(repeat).await
    }

    async fn advance_with(&mut self, repeat: RepeatMode) -> Result<Option<usize>> {
        self.commit(|state, tracking, rng| {
            let next = next_index(state, tracking, rng, repeat);
            move_cursor(state, tracking, next)?;
            debug!(next = ?next, repeat = %repeat, shuffle = state.shuffle, "Queue advanced");
            Ok(next)
        })
        .await
    }

    /// Step back through play history, falling back to queue order
    pub async fn retreat(&mut self) -> Result<Option<usize>> {
        self.commit(|state, tracking, _| {
            let mut target = None;
            while let Some(id) = tracking.history.pop() {
                if let Some(index) = state.position_of(id) {
                    if Some(index) != state.current_index {
                        target = Some(index);
                        break;
                    }
                }
            }
            let target = target.or_else(|| state.linear_predecessor());

            state.set_current_index(target)?;
            if let Some(entry) = state.current_entry() {
                tracking.visited.insert(entry.id);
            }
            Ok(target)
        })
        .await
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.commit(|state, tracking, _| {
            state.clear();
            tracking.reset();
            Ok(())
        })
        .await
    }

    pub async fn set_repeat_mode(&mut self, mode: RepeatMode) -> Result<()> {
        self.commit(|state, _, _| {
            state.repeat_mode = mode;
            Ok(())
        })
        .await
    }

    /// Turning shuffle on starts a fresh pass
    pub async fn set_shuffle(&mut self, enabled: bool) -> Result<()> {
        self.commit(|state, tracking, _| {
            if enabled && !state.shuffle {
                tracking.visited.clear();
                if let Some(entry) = state.current_entry() {
                    tracking.visited.insert(entry.id);
                }
            }
            state.shuffle = enabled;
            Ok(())
        })
        .await
    }

    pub async fn set_volume(&mut self, volume: f32) -> Result<()> {
        let volume = validate_volume(volume)?;
        self.commit(|state, _, _| {
            state.volume = volume;
            Ok(())
        })
        .await
    }

    pub async fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.commit(|state, _, _| {
            state.muted = muted;
            Ok(())
        })
        .await
    }

    pub async fn set_active_backend(&mut self, kind: BackendKind) -> Result<()> {
        self.commit(|state, _, _| {
            state.active_backend = kind;
            Ok(())
        })
        .await
    }

    async fn commit<R>(
        &mut self,
        mutate: impl FnOnce(&mut QueueState, &mut PlayTracking, &mut StdRng) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.clone();
        let mut tracking = self.tracking.clone();
        let result = mutate(&mut state, &mut tracking, &mut self.rng)?;

        if state != self.state {
            self.doc.save(&state).await?;
        }
        self.state = state;
        self.tracking = tracking;
        Ok(result)
    }
}

/// Reject non-finite values, clamp the rest into 0.0..=1.0
pub fn validate_volume(volume: f32) -> Result<f32> {
    if volume.is_finite() {
        Ok(volume.clamp(0.0, 1.0))
    } else {
        Err(Error::InvalidInput(format!("Volume must be a number, got {}", volume)))
    }
}

/// Make `index` current, recording the outgoing entry in history
fn move_cursor(state: &mut QueueState, tracking: &mut PlayTracking, index: Option<usize>) -> Result<()> {
    let previous = state.current_entry().map(|e| e.id);
    state.set_current_index(index)?;
    let next = state.current_entry().map(|e| e.id);

    if let Some(previous) = previous {
        if next != Some(previous) {
            tracking.history.push(previous);
            if tracking.history.len() > MAX_HISTORY {
                tracking.history.remove(0);
            }
        }
    }
    if let Some(next) = next {
        tracking.visited.insert(next);
    }
    Ok(())
}

fn next_index(
    state: &QueueState,
    tracking: &mut PlayTracking,
    rng: &mut StdRng,
    repeat: RepeatMode,
) -> Option<usize> {
    if state.is_empty() {
        return None;
    }
    if repeat == RepeatMode::One && state.current_index.is_some() {
        return state.current_index;
    }
    if !state.shuffle {
        return state.linear_successor(repeat);
    }

    let unvisited: Vec<usize> = (0..state.len())
        .filter(|&i| Some(i) != state.current_index)
        .filter(|&i| !tracking.visited.contains(&state.entries[i].id))
        .collect();
    if let Some(&pick) = unvisited.choose(rng) {
        return Some(pick);
    }

    // Pass complete: linear order, and repeat-all opens a new pass
    if repeat == RepeatMode::All {
        tracking.visited.clear();
    }
    state.linear_successor(repeat)
}
