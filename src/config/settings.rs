//! Settings sections of `mimic.toml`
//!
//! Each section deserializes independently with per-field defaults, so a
//! config file only needs to mention the values it overrides.
//!
//! # Main Types
//!
//! - [`StorageSettings`] - Where records live and how they are named
//! - [`RecordingSettings`] - Snapshot interval, name limits, save mode
//! - [`PlaybackSettings`] - Operator notices and progress logging
//! - [`ProxySettings`] - Bounded retry budget for proxy assignment
//! - [`LoggingSettings`] - Filter directive and optional log directory

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::codec::RECORD_FILE_EXTENSION;

/// Category used when a recording is started without one
pub const DEFAULT_CATEGORY: &str = "default";

/// Ticks between periodic origin-only snapshots
pub const DEFAULT_SNAPSHOT_INTERVAL: u32 = 10_000;

/// Maximum record name length in bytes
pub const MAX_RECORD_NAME_LENGTH: usize = 128;

/// Maximum bookmark name length in bytes
pub const MAX_BOOKMARK_NAME_LENGTH: usize = 64;

/// Record storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root record directory. `None` uses `records/` in the app data dir.
    pub record_dir: Option<PathBuf>,

    /// Record file extension (without the dot)
    pub extension: String,

    /// Category used when none is given
    pub default_category: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            record_dir: None,
            extension: RECORD_FILE_EXTENSION.to_string(),
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

/// How finished recordings are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Write on the tick thread inside `stop`
    #[default]
    Inline,
    /// Hand the record to a worker thread, register it when the write completes
    Background,
}

/// Recording settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Frames between origin-only snapshots (0 disables)
    pub snapshot_interval: u32,

    pub max_name_length: usize,

    pub max_bookmark_name_length: usize,

    pub save_mode: SaveMode,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            max_name_length: MAX_RECORD_NAME_LENGTH,
            max_bookmark_name_length: MAX_BOOKMARK_NAME_LENGTH,
            save_mode: SaveMode::Inline,
        }
    }
}

/// Playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Print a line to the operator when a proxy passes a bookmark
    pub announce_bookmarks: bool,

    /// Log playback progress every N ticks (0 disables)
    pub progress_log_interval: u32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            announce_bookmarks: true,
            progress_log_interval: 100,
        }
    }
}

/// Proxy assignment settings
///
/// Defaults assume a 64 Hz tick: first attempt after one second, then every
/// 0.1 s, for at most 100 attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Proxy group used when none is given
    pub group: String,

    pub initial_delay_ticks: u32,

    pub retry_interval_ticks: u32,

    pub max_attempts: u32,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            group: "t".to_string(),
            initial_delay_ticks: 64,
            retry_interval_ticks: 7,
            max_attempts: 100,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,

    /// Directory for daily-rolling log files
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info,mimic_rs=debug".to_string(),
            log_dir: None,
        }
    }
}
