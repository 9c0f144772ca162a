//! Settings document access
//!
//! The settings document is a flat JSON object shared with the UI layer, which
//! owns most of its keys. The core reads the access policy and the backend
//! preference from it and writes back only the backend preference. Unknown
//! keys are preserved on every write.

use crate::error::{Error, Result};
use jukebox_common::events::BackendKind;
use jukebox_common::JsonDocument;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const PARTY_MODE_KEY: &str = "partyMode";
pub const ALLOW_EDIT_PLAYLISTS_KEY: &str = "allowEditPlaylists";
pub const AUDIO_PLAYER_KEY: &str = "audioPlayer";

/// Actions gated by the access policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Any playlist write
    Edit,
}

impl std::fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyAction::Edit => write!(f, "edit"),
        }
    }
}

/// Party-mode restrictions, read from settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    pub party_mode_enabled: bool,
    pub allow_edit_playlists: bool,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            party_mode_enabled: false,
            allow_edit_playlists: true,
        }
    }
}

impl AccessPolicy {
    /// Outside party mode everything is permitted
    pub fn permits(&self, action: PolicyAction) -> bool {
        if !self.party_mode_enabled {
            return true;
        }
        match action {
            PolicyAction::Edit => self.allow_edit_playlists,
        }
    }

    pub fn check(&self, action: PolicyAction) -> Result<()> {
        if self.permits(action) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "Party mode does not allow playlist {}",
                action
            )))
        }
    }
}

/// Key-value settings document
pub struct SettingsStore {
    doc: JsonDocument<Map<String, Value>>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            doc: JsonDocument::new(path),
            write_lock: Mutex::new(()),
        }
    }

    /// Current access policy; missing keys fall back to the permissive default
    pub async fn access_policy(&self) -> Result<AccessPolicy> {
        let defaults = AccessPolicy::default();
        let party_mode_enabled = self
            .get_setting::<bool>(PARTY_MODE_KEY)
            .await?
            .unwrap_or(defaults.party_mode_enabled);
        let allow_edit_playlists = self
            .get_setting::<bool>(ALLOW_EDIT_PLAYLISTS_KEY)
            .await?
            .unwrap_or(defaults.allow_edit_playlists);

        Ok(AccessPolicy {
            party_mode_enabled,
            allow_edit_playlists,
        })
    }

    /// Persisted backend preference
    ///
    /// A missing or unreadable value is initialized with the default and
    /// written back so the document always names the live backend.
    pub async fn backend_preference(&self) -> Result<BackendKind> {
        match self.get_setting::<BackendKind>(AUDIO_PLAYER_KEY).await? {
            Some(kind) => Ok(kind),
            None => {
                let default = BackendKind::default();
                self.set_backend_preference(default).await?;
                Ok(default)
            }
        }
    }

    pub async fn set_backend_preference(&self, kind: BackendKind) -> Result<()> {
        self.set_setting(AUDIO_PLAYER_KEY, kind).await
    }

    async fn get_setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let settings = self.doc.load_or_default().await?;
        let Some(value) = settings.get(key) else {
            return Ok(None);
        };

        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                warn!(key, value = %value, error = %e, "Ignoring unreadable setting");
                Ok(None)
            }
        }
    }

    async fn set_setting<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| Error::Internal(format!("Failed to encode setting {}: {}", key, e)))?;

        let _guard = self.write_lock.lock().await;
        let mut settings = self.doc.load_or_default().await?;
        debug!(key, value = %value, "Writing setting");
        settings.insert(key.to_string(), value);
        self.doc.save(&settings).await?;
        Ok(())
    }
}
