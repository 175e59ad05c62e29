//! Filesystem inspection of candidate root directories.

use std::io::ErrorKind;

use crate::error::{PathValidation, ValidationReason};
use crate::path::normalize_path;

/// Stat `raw` and classify it as a usable directory or not.
///
/// Checks run in order: empty input, existence, directory-ness and finally
/// readability (the directory is opened for listing). This never fails; every
/// problem is reported as [`PathValidation::Invalid`].
pub async fn inspect_directory(raw: &str) -> PathValidation {
    let invalid = |reason| PathValidation::Invalid {
        path: raw.to_string(),
        reason,
    };

    if raw.trim().is_empty() {
        return invalid(ValidationReason::InvalidInput);
    }

    let path = normalize_path(raw);
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(err) => {
            return invalid(match err.kind() {
                ErrorKind::PermissionDenied => ValidationReason::PermissionDenied,
                ErrorKind::InvalidInput => ValidationReason::InvalidInput,
                _ => ValidationReason::NotFound,
            });
        }
    };

    if !metadata.is_dir() {
        return invalid(ValidationReason::NotADirectory);
    }

    match tokio::fs::read_dir(&path).await {
        Ok(_) => PathValidation::Valid { path },
        Err(_) => invalid(ValidationReason::PermissionDenied),
    }
}
