//! Playback control
//!
//! - `controller`: serialized command execution against the live backend
//! - `commands`: command mailbox with coalescing
//! - `status`: non-blocking status snapshots

mod commands;
mod controller;
mod status;

pub use controller::PlaybackController;
pub use status::{PlaybackStatus, StatusHandle, TransitionGuard};
