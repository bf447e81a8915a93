//! Error handling for mimic-rs
//!
//! This module defines the error taxonomy shared by the codec, the catalog
//! and both session managers, plus a Result alias. Every failure is returned
//! as a value; I/O problems are folded into [`MimicError::BadFile`] at the
//! codec boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ActorId;

/// Main error type for mimic-rs operations
#[derive(Error, Debug)]
pub enum MimicError {
    /// The actor has no body that can be sampled or driven
    #[error("{0} is not controllable")]
    NotControllable(ActorId),

    #[error("{0} is already recording")]
    AlreadyRecording(ActorId),

    #[error("{0} is not recording")]
    NotRecording(ActorId),

    #[error("recording for {0} is already paused")]
    AlreadyPaused(ActorId),

    #[error("recording for {0} is not paused")]
    NotPaused(ActorId),

    #[error("bookmark '{0}' already exists")]
    DuplicateBookmarkName(String),

    #[error("bookmark '{0}' not found")]
    BookmarkNotFound(String),

    #[error("{0} is not mimicking a record")]
    NotMimicking(ActorId),

    #[error("record file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Magic mismatch, truncated stream, or any I/O failure while reading or writing
    #[error("bad record file: {0}")]
    BadFile(String),

    #[error("record format version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u8, supported: u8 },

    /// The record (or the recording) has no frames
    #[error("record has no frames")]
    EmptyRecord,

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MimicError>,
    },
}

impl MimicError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MimicError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a [`MimicError::BadFile`] from an I/O error
    pub fn bad_file(err: std::io::Error) -> Self {
        MimicError::BadFile(err.to_string())
    }

    /// The innermost error, skipping any context wrappers
    pub fn root(&self) -> &MimicError {
        match self {
            MimicError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for mimic-rs operations
pub type Result<T> = std::result::Result<T, MimicError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MimicError::DuplicateBookmarkName("A".to_string());
        assert_eq!(err.to_string(), "bookmark 'A' already exists");

        let err = MimicError::UnsupportedVersion {
            found: 3,
            supported: 2,
        };
        assert!(err.to_string().contains("version 3"));
    }

    #[test]
    fn test_error_with_context() {
        let err = MimicError::EmptyRecord;
        let with_ctx = err.with_context("Failed to play");
        assert!(with_ctx.to_string().contains("Failed to play"));
        assert!(matches!(with_ctx.root(), MimicError::EmptyRecord));
    }

    #[test]
    fn test_result_ext_lazy_context() {
        let res: Result<()> = Err(MimicError::NotRecording(ActorId(7)));
        let err = res.with_context(|| "stopping".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "stopping: actor#7 is not recording");
    }
}
