//! Watcher error types.

use std::path::PathBuf;

use thiserror::Error;
use vidscan_core::ValidationReason;

/// Errors raised by the change watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The target is not an existing, readable directory.
    #[error("Cannot watch {path}: {}", .reason.message())]
    InvalidWatchTarget {
        path: String,
        reason: ValidationReason,
    },

    /// The native notification backend failed.
    #[error("Watcher backend error for {path}: {source}")]
    Backend {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// An exclude pattern is not a valid glob.
    #[error("Invalid exclude pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The watch configuration failed validation.
    #[error("Invalid watch configuration: {message}")]
    InvalidConfig { message: String },
}

impl WatchError {
    /// Validation reason behind this error, if any.
    pub fn reason(&self) -> Option<ValidationReason> {
        match self {
            Self::InvalidWatchTarget { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
