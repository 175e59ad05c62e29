//! Output parsing: progress lines and media records.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

static PROGRESS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"progress:\s*(\d+)\s*/\s*(\d+)").expect("progress pattern is valid"));

/// Technical metadata for one media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    /// Frame size such as `1920x1080`.
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub frame_rate: Option<f64>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    /// Bits per second.
    #[serde(default)]
    pub bitrate: Option<u64>,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub depth: Option<u32>,
}

/// A `progress: current/total` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractProgress {
    pub current: u64,
    pub total: u64,
}

impl ExtractProgress {
    /// Completed fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.current as f64 / self.total as f64).min(1.0)
    }
}

/// Parse a progress report out of one output line.
pub fn parse_progress(line: &str) -> Option<ExtractProgress> {
    let caps = PROGRESS_LINE.captures(line)?;
    Some(ExtractProgress {
        current: caps[1].parse().ok()?,
        total: caps[2].parse().ok()?,
    })
}

/// Extract the records following the last `marker` line.
pub fn parse_records(lines: &[String], marker: &str) -> Result<Vec<MediaRecord>, ExtractError> {
    let marker = marker.trim();
    let start = lines
        .iter()
        .rposition(|line| line.trim() == marker)
        .ok_or_else(|| ExtractError::MissingMarker {
            marker: marker.to_string(),
        })?;

    let body = lines[start + 1..].join("\n");
    serde_json::from_str(body.trim()).map_err(|source| ExtractError::MalformedOutput { source })
}
