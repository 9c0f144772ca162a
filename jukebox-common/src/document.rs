//! Whole-document JSON storage
//!
//! Every persisted piece of jukebox state (queue snapshot, playlists, settings)
//! is a single JSON document that is read whole and replaced whole.
//!
//! Writes go to a uniquely-named sibling file first and are then renamed over
//! the target, so a reader sees either the previous document or the new one,
//! never a partial write.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Typed handle to a JSON document on disk
pub struct JsonDocument<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Location of the document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the document
    ///
    /// Returns `Ok(None)` if the document does not exist yet.
    pub async fn load(&self) -> Result<Option<T>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| Error::Document {
                path: self.path.clone(),
                source,
            })
    }

    /// Read the document, falling back to `T::default()` when absent
    pub async fn load_or_default(&self) -> Result<T>
    where
        T: Default,
    {
        Ok(self.load().await?.unwrap_or_default())
    }

    /// Replace the document atomically
    pub async fn save(&self, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| Error::Document {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let staging = self.staging_path()?;
        if let Err(e) = write_synced(&staging, &bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            warn!(path = %self.path.display(), error = %e, "Failed to replace document");
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "Document saved");
        Ok(())
    }

    /// Delete the document
    ///
    /// Returns `false` if there was nothing to delete.
    pub async fn remove(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn staging_path(&self) -> Result<PathBuf> {
        let file_name = self.path.file_name().ok_or_else(|| {
            Error::InvalidInput(format!("Document path has no file name: {}", self.path.display()))
        })?;

        let mut staging_name = file_name.to_os_string();
        staging_name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        Ok(self.path.with_file_name(staging_name))
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

impl<T> Clone for JsonDocument<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for JsonDocument<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonDocument").field("path", &self.path).finish()
    }
}
