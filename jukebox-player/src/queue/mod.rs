//! Playback queue
//!
//! Ordered entries with a current-entry pointer, repeat/shuffle modes and
//! volume, persisted as one JSON snapshot after every mutation.

mod state;
mod store;

pub use state::{QueueEntry, QueueState, DEFAULT_VOLUME};
pub use store::{validate_volume, QueueStore};
