//! # Jukebox Common Library
//!
//! Shared code for the jukebox playback core:
//! - Error type used by shared infrastructure
//! - Data folder resolution and config file discovery
//! - Atomic whole-document JSON storage
//! - Event types and the broadcast EventBus
//! - Timestamp helpers

pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod time;

pub use document::JsonDocument;
pub use error::{Error, Result};
pub use events::{EventBus, JukeboxEvent};
