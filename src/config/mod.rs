//! Configuration module for mimic-rs
//!
//! This module handles the `mimic.toml` configuration file and the
//! application data directory.
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.mimic-rs/`
//! - **macOS**: `~/Library/Application Support/dev.mimic-rs/`
//! - **Windows**: `%APPDATA%\dev.mimic-rs\`
//!
//! # Files
//!
//! - `mimic.toml` - Configuration (all sections optional)
//! - `records/` - Default record directory
//!
//! # Example
//!
//! ```ignore
//! use mimic_rs::config::MimicConfig;
//!
//! let config = MimicConfig::load_or_default();
//! let catalog = Catalog::new(config.record_dir()?, &config.storage.extension);
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{MimicError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.mimic-rs";

/// Config filename
pub const CONFIG_FILE: &str = "mimic.toml";

/// Default record directory name inside the app data dir
pub const RECORDS_DIR: &str = "records";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Config ====================

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MimicConfig {
    pub storage: StorageSettings,
    pub recording: RecordingSettings,
    pub playback: PlaybackSettings,
    pub proxy: ProxySettings,
    pub logging: LoggingSettings,
}

impl MimicConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MimicError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize to a TOML document
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| MimicError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| MimicError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Load from the default location
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            MimicError::Config("Could not determine config path".to_string())
        })?;
        Self::load_from(&path)
    }

    /// Load config, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MimicError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, self.to_toml()?)
            .map_err(|e| MimicError::Config(format!("Failed to write config: {}", e)))
    }

    /// Resolved record directory
    pub fn record_dir(&self) -> Result<PathBuf> {
        match &self.storage.record_dir {
            Some(dir) => Ok(dir.clone()),
            None => app_data_dir().map(|p| p.join(RECORDS_DIR)).ok_or_else(|| {
                MimicError::Config("Could not determine record directory".to_string())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = MimicConfig::default();
        assert_eq!(config.storage.extension, "rec");
        assert_eq!(config.storage.default_category, "default");
        assert_eq!(config.recording.snapshot_interval, 10_000);
        assert_eq!(config.recording.save_mode, SaveMode::Inline);
        assert_eq!(config.proxy.max_attempts, 100);
    }

    #[test]
    fn test_partial_config() {
        let config = MimicConfig::from_toml(
            r#"
            [recording]
            snapshot_interval = 0
            save_mode = "background"

            [storage]
            record_dir = "/srv/records"
            "#,
        )
        .unwrap();

        assert_eq!(config.recording.snapshot_interval, 0);
        assert_eq!(config.recording.save_mode, SaveMode::Background);
        assert_eq!(config.recording.max_name_length, MAX_RECORD_NAME_LENGTH);
        assert_eq!(config.record_dir().unwrap(), PathBuf::from("/srv/records"));
        assert_eq!(config.playback, PlaybackSettings::default());
    }

    #[test]
    fn test_invalid_config() {
        let err = MimicConfig::from_toml("[recording]\nsnapshot_interval = \"often\"").unwrap_err();
        assert!(matches!(err, MimicError::Config(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/mimic.toml");

        let mut config = MimicConfig::default();
        config.proxy.group = "ct".to_string();
        config.logging.log_dir = Some(dir.path().join("logs"));
        config.save_to(&path).unwrap();

        assert_eq!(MimicConfig::load_from(&path).unwrap(), config);
        assert_eq!(
            MimicConfig::load_from(&dir.path().join("missing.toml")).unwrap(),
            MimicConfig::default()
        );
    }
}
