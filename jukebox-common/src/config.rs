//! Configuration file discovery and data folder resolution
//!
//! Data folder resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file value
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "JUKEBOX_DATA_FOLDER";

/// Environment variable pointing at the TOML config file
pub const CONFIG_FILE_ENV: &str = "JUKEBOX_CONFIG";

/// Resolve the folder holding queue, playlist and settings documents
pub fn resolve_data_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_value: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = config_value {
        return path.to_path_buf();
    }

    // Priority 4: OS-dependent compiled default
    default_data_folder()
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/jukebox (or /var/lib/jukebox for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("jukebox"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/jukebox"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("jukebox"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/jukebox"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("jukebox"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\jukebox"))
    } else {
        PathBuf::from("./jukebox_data")
    }
}

/// Locate the default config file for the platform, if one exists
///
/// On Linux the user file (`~/.config/jukebox/config.toml`) wins over the
/// system file (`/etc/jukebox/config.toml`).
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("jukebox").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/jukebox/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load a TOML config file
///
/// An explicitly requested file must exist. Without an explicit path the
/// platform default is tried, and a missing file falls back to `T::default()`
/// with a warning rather than failing startup.
pub fn load_toml_config<T>(explicit: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match find_config_file() {
            Some(path) => path,
            None => {
                warn!("No config file found, using built-in defaults");
                return Ok(T::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}
