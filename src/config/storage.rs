//! Settings persistence
//!
//! Layout under the per-user config directory:
//!
//! ```text
//! ~/.remoteguard/                (%APPDATA%\RemoteGuard on Windows)
//! ├── settings.json              AppSettings
//! └── known_hosts.json           trusted host keys (see host_keys::trust_store)
//! ```
//!
//! A settings file that fails to parse or validate is moved aside to
//! `settings.json.corrupt.<timestamp>` and defaults are used. A file written
//! by a newer version is left alone and reported as an error.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use super::types::{AppSettings, CONFIG_VERSION};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config version {found} is newer than supported {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

impl serde::Serialize for StorageError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Per-user config directory
pub fn config_dir() -> Result<PathBuf, StorageError> {
    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join("RemoteGuard"));
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".remoteguard"))
        .ok_or(StorageError::NoConfigDir)
}

pub fn settings_file() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join("settings.json"))
}

pub fn known_hosts_file() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join("known_hosts.json"))
}

/// Parse and check one settings document
fn parse_settings(contents: &str) -> Result<AppSettings, StorageError> {
    let settings: AppSettings = serde_json::from_str(contents)?;
    if settings.version > CONFIG_VERSION {
        return Err(StorageError::VersionTooNew {
            found: settings.version,
            supported: CONFIG_VERSION,
        });
    }
    settings.validate().map_err(StorageError::Invalid)?;
    Ok(settings)
}

/// Reads and writes `settings.json`
pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    /// Storage at the default per-user location
    pub fn new() -> Result<Self, StorageError> {
        Ok(Self::with_path(settings_file()?))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; missing file means defaults
    pub async fn load(&self) -> Result<AppSettings, StorageError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {:?}, using defaults", self.path);
                return Ok(AppSettings::default());
            }
            Err(e) => return Err(e.into()),
        };

        match parse_settings(&contents) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", self.path);
                Ok(settings)
            }
            Err(e @ StorageError::VersionTooNew { .. }) => Err(e),
            Err(e) => {
                warn!("Settings file {:?} unusable: {}", self.path, e);
                match self.quarantine().await {
                    Ok(moved_to) => warn!("Moved unusable settings to {:?}", moved_to),
                    Err(move_err) => error!("Failed to move unusable settings: {}", move_err),
                }
                Ok(AppSettings::default())
            }
        }
    }

    /// Validate, then write atomically (temp file, fsync, rename)
    pub async fn save(&self, settings: &AppSettings) -> Result<(), StorageError> {
        settings.validate().map_err(StorageError::Invalid)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(settings)?;

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, &self.path).await?;

        info!("Settings saved to {:?}", self.path);
        Ok(())
    }

    /// Move the current file out of the way
    async fn quarantine(&self) -> Result<PathBuf, StorageError> {
        let target = self.path.with_extension(format!(
            "json.corrupt.{}",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        fs::rename(&self.path, &target).await?;
        Ok(target)
    }
}
