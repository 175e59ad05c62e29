//! File entry type.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::path::extension_of;

/// A qualifying media file found by a traversal.
///
/// Entries are created once by the scanner and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute path of the entry as reached from the scan root.
    pub absolute_path: PathBuf,
    /// File name (last path component).
    pub name: CompactString,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Number of path components below the scan root.
    pub depth: u32,
    /// Lowercased extension without the dot.
    pub extension: CompactString,
    /// The entry was reached through a followed symbolic link.
    pub is_symlink_resolved: bool,
}

impl FileEntry {
    /// Build an entry from a path and the metadata of the file it points to.
    pub fn from_metadata(
        path: impl Into<PathBuf>,
        metadata: &Metadata,
        depth: u32,
        is_symlink_resolved: bool,
    ) -> Self {
        let absolute_path = path.into();
        let name = absolute_path
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_default();
        let extension = extension_of(&absolute_path).unwrap_or_default();

        Self {
            absolute_path,
            name,
            size_bytes: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            depth,
            extension,
            is_symlink_resolved,
        }
    }

    /// Path of the entry.
    pub fn path(&self) -> &Path {
        &self.absolute_path
    }
}
