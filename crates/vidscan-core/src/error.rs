//! Error, warning and validation types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a path was rejected as a scan or watch target.
///
/// Variants are listed in the order they are checked.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
pub enum ValidationReason {
    /// Empty or otherwise malformed input.
    InvalidInput,
    /// Nothing exists at the path.
    NotFound,
    /// The path exists but is not a directory.
    NotADirectory,
    /// The directory cannot be read by this process.
    PermissionDenied,
}

impl ValidationReason {
    /// Human-readable description.
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Path must not be empty",
            Self::NotFound => "Path does not exist",
            Self::NotADirectory => "Path is not a directory",
            Self::PermissionDenied => "Directory is not readable",
        }
    }
}

/// Outcome of validating a candidate root directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PathValidation {
    /// The path is an existing, readable directory.
    Valid { path: PathBuf },
    /// The path was rejected.
    Invalid { path: String, reason: ValidationReason },
}

impl PathValidation {
    /// Check if the path was accepted.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Rejection reason, if any.
    pub fn reason(&self) -> Option<ValidationReason> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid { reason, .. } => Some(*reason),
        }
    }

    /// Convert into a result suitable for `?` propagation.
    pub fn into_result(self) -> Result<PathBuf, ScanError> {
        match self {
            Self::Valid { path } => Ok(path),
            Self::Invalid { path, reason } => Err(ScanError::Invalid { path, reason }),
        }
    }
}

/// Errors that abort a scan.
///
/// Per-entry and per-subdirectory problems never surface here; they are
/// recorded as [`ScanWarning`]s on the result instead.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The root failed validation.
    #[error("{}: {path}", .reason.message())]
    Invalid {
        path: String,
        reason: ValidationReason,
    },

    /// The root directory could not be listed.
    #[error("Failed to read scan root {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request itself is malformed.
    #[error("Invalid scan request: {message}")]
    InvalidRequest { message: String },
}

impl ScanError {
    /// Create a root read error, classifying well-known I/O kinds.
    pub fn root_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::Invalid {
                path: path.to_string_lossy().into_owned(),
                reason: ValidationReason::PermissionDenied,
            },
            std::io::ErrorKind::NotFound => Self::Invalid {
                path: path.to_string_lossy().into_owned(),
                reason: ValidationReason::NotFound,
            },
            _ => Self::DirectoryRead { path, source },
        }
    }

    /// Validation reason behind this error, if any.
    pub fn reason(&self) -> Option<ValidationReason> {
        match self {
            Self::Invalid { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Kind of recovered scan problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum WarningKind {
    /// A single entry could not be stat'ed.
    EntryRead,
    /// A subdirectory could not be canonicalized or listed.
    DirectoryRead,
    /// A followed symbolic link could not be resolved.
    SymlinkResolution,
}

/// Non-fatal problem encountered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create an entry read warning.
    pub fn entry_read(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(path, format!("Read error: {error}"), WarningKind::EntryRead)
    }

    /// Create a directory read warning.
    pub fn directory_read(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(
            path,
            format!("Directory read error: {error}"),
            WarningKind::DirectoryRead,
        )
    }

    /// Create a symlink resolution warning.
    pub fn symlink_resolution(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(
            path,
            format!("Unresolvable symlink: {error}"),
            WarningKind::SymlinkResolution,
        )
    }
}

/// Errors reading or writing the settings document.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read or written.
    #[error("Settings I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON.
    #[error("Malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The settings could not be serialized, e.g. a path that is not UTF-8.
    #[error("Could not encode settings for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No home directory to place the settings file in.
    #[error("Could not determine the home directory")]
    NoHomeDir,
}
