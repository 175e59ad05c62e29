//! Error types for metadata extraction.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running the extraction tool.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The tool did not finish in time and was killed.
    #[error("Extraction timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The tool could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tool exited unsuccessfully.
    #[error("Extraction failed{}: {stderr}", code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    Process { code: Option<i32>, stderr: String },

    /// The output never contained the result marker line.
    #[error("Result marker {marker:?} not found in output")]
    MissingMarker { marker: String },

    /// The text after the marker was not a JSON array of records.
    #[error("Malformed extraction output: {source}")]
    MalformedOutput {
        #[source]
        source: serde_json::Error,
    },

    /// Reading the tool's output failed.
    #[error("I/O error while reading extraction output: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// True when the error came from the tool itself rather than from how
    /// it was invoked.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Self::Process { .. } | Self::MissingMarker { .. } | Self::MalformedOutput { .. }
        )
    }
}
