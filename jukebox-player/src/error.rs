//! Error types for jukebox-player
//!
//! Every failure the core reports carries a classification ([`ErrorKind`]) so
//! callers never have to interpret raw transport errors. Errors are `Clone`
//! because one command result may be delivered to several coalesced callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for jukebox-player
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// External player process unreachable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Track rejected by the external player
    #[error("Playback error: {0}")]
    Playback(String),

    /// Conflicting operation already in flight
    #[error("Busy: {0}")]
    Busy(String),

    /// Denied by the access policy
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown playlist, track or queue entry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bounded wait exceeded
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Invalid request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Document read/write or encoding failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure classification exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ConnectionError,
    PlaybackError,
    Busy,
    Forbidden,
    NotFound,
    Timeout,
    InvalidInput,
    Storage,
    Config,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::ConnectionError => "ConnectionError",
            ErrorKind::PlaybackError => "PlaybackError",
            ErrorKind::Busy => "Busy",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::Storage => "Storage",
            ErrorKind::Config => "Config",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(_) => ErrorKind::ConnectionError,
            Error::Playback(_) => ErrorKind::PlaybackError,
            Error::Busy(_) => ErrorKind::Busy,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Config(_) => ErrorKind::Config,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<jukebox_common::Error> for Error {
    fn from(e: jukebox_common::Error) -> Self {
        use jukebox_common::Error as Common;
        match e {
            Common::NotFound(msg) => Error::NotFound(msg),
            Common::InvalidInput(msg) => Error::InvalidInput(msg),
            Common::Config(msg) => Error::Config(msg),
            Common::Internal(msg) => Error::Internal(msg),
            other @ (Common::Io(_) | Common::Document { .. }) => Error::Storage(other.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Convenience Result type using jukebox-player Error
pub type Result<T> = std::result::Result<T, Error>;

/// Serializable success-or-classified-failure result handed to the UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome<T> {
    Ok { value: T },
    Failed { kind: ErrorKind, message: String },
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::Ok { value },
            Err(e) => Outcome::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}
