//! Scan result container and per-depth statistics.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::entry::FileEntry;
use crate::error::ScanWarning;
use crate::request::ScanRequest;

/// File and directory counts recorded at one depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthCounts {
    /// Accepted files at this depth.
    pub files: u64,
    /// Directories encountered at this depth.
    pub dirs: u64,
}

impl DepthCounts {
    /// Files plus directories.
    pub fn total(&self) -> u64 {
        self.files + self.dirs
    }
}

/// Mapping from depth to [`DepthCounts`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepthHistogram(BTreeMap<u32, DepthCounts>);

impl DepthHistogram {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted file.
    pub fn record_file(&mut self, depth: u32) {
        self.0.entry(depth).or_default().files += 1;
    }

    /// Record a directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.0.entry(depth).or_default().dirs += 1;
    }

    /// Fold another histogram into this one.
    pub fn merge(&mut self, other: DepthHistogram) {
        for (depth, counts) in other.0 {
            let slot = self.0.entry(depth).or_default();
            slot.files += counts.files;
            slot.dirs += counts.dirs;
        }
    }

    /// Counts at a given depth.
    pub fn get(&self, depth: u32) -> Option<&DepthCounts> {
        self.0.get(&depth)
    }

    /// Iterate over depths in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &DepthCounts)> {
        self.0.iter().map(|(d, c)| (*d, c))
    }

    /// Deepest depth at which a file was recorded.
    pub fn max_file_depth(&self) -> u32 {
        self.0
            .iter()
            .rev()
            .find(|(_, c)| c.files > 0)
            .map(|(d, _)| *d)
            .unwrap_or(0)
    }

    /// Total files over all depths.
    pub fn total_files(&self) -> u64 {
        self.0.values().map(|c| c.files).sum()
    }

    /// Total directories over all depths.
    pub fn total_dirs(&self) -> u64 {
        self.0.values().map(|c| c.dirs).sum()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Complete outcome of one traversal.
///
/// Results are assembled once the traversal finishes; partial results are
/// never produced or cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Normalized root that was scanned.
    pub root: PathBuf,

    /// Request that produced this result.
    pub request: ScanRequest,

    /// Accepted files, in no particular order.
    pub entries: Vec<FileEntry>,

    /// Number of directory entries examined.
    pub total_visited: u64,

    /// Per-depth file and directory counts.
    pub depth_histogram: DepthHistogram,

    /// Deepest depth of any accepted entry (0 if none).
    pub max_depth_reached: u32,

    /// Entries and directories skipped because they could not be read.
    pub skipped_entries: u64,

    /// Recovered errors encountered during the traversal.
    pub warnings: Vec<ScanWarning>,

    /// When the traversal finished.
    pub completed_at: SystemTime,

    /// Duration of the traversal.
    pub scan_duration: Duration,
}

impl ScanResult {
    /// Assemble a result from traversal output.
    pub fn new(
        root: PathBuf,
        request: ScanRequest,
        entries: Vec<FileEntry>,
        total_visited: u64,
        depth_histogram: DepthHistogram,
        warnings: Vec<ScanWarning>,
        scan_duration: Duration,
    ) -> Self {
        let max_depth_reached = entries.iter().map(|e| e.depth).max().unwrap_or(0);
        Self {
            root,
            request,
            entries,
            total_visited,
            depth_histogram,
            max_depth_reached,
            skipped_entries: warnings.len() as u64,
            warnings,
            completed_at: SystemTime::now(),
            scan_duration,
        }
    }

    /// Number of accepted files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no files were accepted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the sizes of all accepted files.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }

    /// Check if there were any warnings during the traversal.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
