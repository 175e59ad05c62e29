//! Depth preview and depth-setting advice.
//!
//! A preview is a cheap structural walk (no extension filtering, hidden
//! entries skipped) used to suggest a sensible `max_depth` before a real
//! scan is run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use serde::Serialize;
use vidscan_core::{MAX_SCAN_DEPTH, MIN_SCAN_DEPTH, ScanError, ValidationReason};

/// Default depth of a preview walk.
pub const DEFAULT_PREVIEW_DEPTH: u32 = 4;

/// Depth at which a tree counts as deep; also the largest depth recommended.
const RECOMMENDED_DEPTH_CAP: u32 = 6;

/// Upper bound applied to the raw deepest level before capping.
const DEEPEST_LEVEL_LIMIT: u32 = 7;

/// Directory count above which a preview is considered large.
const LARGE_TREE_DIRECTORIES: u64 = 1000;

/// Counts for one level of a preview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreviewLevel {
    pub directories: u64,
    pub files: u64,
}

/// Shape of a directory tree down to a given depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthPreview {
    pub root: PathBuf,
    pub max_depth: u32,
    pub total_directories: u64,
    pub estimated_files: u64,
    /// Levels keyed like entry depths; a level exists once the walk opened
    /// a directory whose children live there.
    pub levels: BTreeMap<u32, PreviewLevel>,
    pub warnings: Vec<String>,
}

impl DepthPreview {
    /// Deepest level the preview reached.
    pub fn deepest_level(&self) -> u32 {
        self.levels.keys().next_back().copied().unwrap_or(MIN_SCAN_DEPTH)
    }
}

/// Walk `root` down to `max_depth` and count directories and files per level.
///
/// Runs on the blocking pool. Unreadable subdirectories are reported as
/// warnings; an unreadable root is an error.
pub async fn preview_depth(root: impl Into<PathBuf>, max_depth: u32) -> Result<DepthPreview, ScanError> {
    let root = root.into();
    let fallback = root.clone();
    tokio::task::spawn_blocking(move || preview_depth_blocking(&root, max_depth))
        .await
        .map_err(|e| ScanError::DirectoryRead {
            path: fallback,
            source: std::io::Error::other(e),
        })?
}

/// Blocking version of [`preview_depth`].
pub fn preview_depth_blocking(root: &Path, max_depth: u32) -> Result<DepthPreview, ScanError> {
    let root = vidscan_core::normalize_path(root);
    let metadata = std::fs::metadata(&root).map_err(|e| ScanError::root_io(&root, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::Invalid {
            path: root.to_string_lossy().into_owned(),
            reason: ValidationReason::NotADirectory,
        });
    }
    std::fs::read_dir(&root).map_err(|e| ScanError::root_io(&root, e))?;

    let max_depth = max_depth.max(1);
    let mut preview = DepthPreview {
        root: root.clone(),
        max_depth,
        total_directories: 0,
        estimated_files: 0,
        levels: BTreeMap::from([(1, PreviewLevel::default())]),
        warnings: Vec::new(),
    };

    let walker = WalkDir::new(&root)
        .skip_hidden(true)
        .follow_links(false)
        .min_depth(1)
        .max_depth(max_depth as usize);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                preview.warnings.push(err.to_string());
                continue;
            }
        };

        let depth = entry.depth() as u32;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            preview.total_directories += 1;
            preview.levels.entry(depth).or_default().directories += 1;
            if depth < max_depth {
                preview.levels.entry(depth + 1).or_default();
            }
        } else if file_type.is_file() {
            preview.estimated_files += 1;
            preview.levels.entry(depth).or_default().files += 1;
        }
    }

    Ok(preview)
}

/// Weight of a piece of advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum Severity {
    Info,
    Warning,
}

/// One line of advice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advice {
    pub severity: Severity,
    pub message: String,
}

impl Advice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Suggested depth with supporting advice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthRecommendation {
    pub recommended_depth: u32,
    pub advice: Vec<Advice>,
}

/// Suggest a scan depth from a preview.
pub fn recommend_depth(preview: &DepthPreview) -> DepthRecommendation {
    let mut advice = Vec::new();

    if preview.total_directories == 0 {
        advice.push(Advice::info("No subdirectories; depth 1 is enough"));
        return DepthRecommendation {
            recommended_depth: 1,
            advice,
        };
    }

    if preview.total_directories > LARGE_TREE_DIRECTORIES {
        advice.push(Advice::warning(
            "Many subdirectories detected; limit the scan depth to keep scans fast",
        ));
    }

    let mut recommended_depth = preview.deepest_level().min(DEEPEST_LEVEL_LIMIT);
    if recommended_depth <= 2 {
        advice.push(Advice::info("Shallow structure; a small scan depth is enough"));
    } else if recommended_depth >= RECOMMENDED_DEPTH_CAP {
        advice.push(Advice::warning("Deep structure; scans may take a while"));
        recommended_depth = RECOMMENDED_DEPTH_CAP;
    }

    DepthRecommendation {
        recommended_depth,
        advice,
    }
}

/// Outcome of checking a user-supplied depth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthCheck {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Check a depth setting before it is stored.
pub fn validate_depth_setting(depth: u32) -> DepthCheck {
    let mut check = DepthCheck {
        is_valid: true,
        ..DepthCheck::default()
    };

    if !(MIN_SCAN_DEPTH..=MAX_SCAN_DEPTH).contains(&depth) {
        check.is_valid = false;
        check.errors.push(format!(
            "Scan depth must be between {MIN_SCAN_DEPTH} and {MAX_SCAN_DEPTH}"
        ));
    }
    if depth > 8 {
        check.warnings.push("Large depths can make scans very slow".to_string());
    }
    if depth == 1 {
        check
            .warnings
            .push("Depth 1 only scans the root directory and misses subfolders".to_string());
    }

    check
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn preview_with(levels: &[(u32, u64, u64)], total_directories: u64) -> DepthPreview {
        DepthPreview {
            root: PathBuf::from("/videos"),
            max_depth: DEFAULT_PREVIEW_DEPTH,
            total_directories,
            estimated_files: 0,
            levels: levels
                .iter()
                .map(|&(depth, directories, files)| (depth, PreviewLevel { directories, files }))
                .collect(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_preview_counts_levels() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::create_dir(temp.path().join(".hidden")).unwrap();
        fs::write(temp.path().join("top.mp4"), "x").unwrap();
        fs::write(temp.path().join("a/mid.mp4"), "x").unwrap();
        fs::write(temp.path().join("a/b/deep.mp4"), "x").unwrap();

        let preview = preview_depth_blocking(temp.path(), 4).unwrap();

        assert_eq!(preview.total_directories, 2);
        assert_eq!(preview.estimated_files, 3);
        assert_eq!(preview.levels[&1], PreviewLevel { directories: 1, files: 1 });
        assert_eq!(preview.levels[&2], PreviewLevel { directories: 1, files: 1 });
        assert_eq!(preview.levels[&3], PreviewLevel { directories: 0, files: 1 });
        assert_eq!(preview.deepest_level(), 3);
    }

    #[test]
    fn test_preview_respects_depth() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b/c")).unwrap();
        fs::write(temp.path().join("a/b/c/deep.mp4"), "x").unwrap();

        let preview = preview_depth_blocking(temp.path(), 2).unwrap();
        assert_eq!(preview.estimated_files, 0);
        assert_eq!(preview.deepest_level(), 2);
    }

    #[test]
    fn test_preview_root_errors() {
        let temp = TempDir::new().unwrap();
        let err = preview_depth_blocking(&temp.path().join("missing"), 3).unwrap_err();
        assert_eq!(err.reason(), Some(ValidationReason::NotFound));
    }

    #[test]
    fn test_recommend_flat_tree() {
        let rec = recommend_depth(&preview_with(&[(1, 0, 4)], 0));
        assert_eq!(rec.recommended_depth, 1);
        assert_eq!(rec.advice[0].severity, Severity::Info);
    }

    #[test]
    fn test_recommend_shallow_and_deep() {
        let shallow = recommend_depth(&preview_with(&[(1, 2, 0), (2, 0, 3)], 2));
        assert_eq!(shallow.recommended_depth, 2);
        assert_eq!(shallow.advice.len(), 1);

        let medium = recommend_depth(&preview_with(&[(1, 1, 0), (2, 1, 0), (3, 1, 0), (4, 0, 1)], 3));
        assert_eq!(medium.recommended_depth, 4);
        assert!(medium.advice.is_empty());

        let deep_levels: Vec<_> = (1..=9).map(|d| (d, 1, 0)).collect();
        let deep = recommend_depth(&preview_with(&deep_levels, 1500));
        assert_eq!(deep.recommended_depth, 6);
        assert_eq!(deep.advice.len(), 2);
        assert!(deep.advice.iter().all(|a| a.severity == Severity::Warning));
    }

    #[test]
    fn test_validate_depth_setting() {
        assert!(validate_depth_setting(5).warnings.is_empty());
        assert!(validate_depth_setting(5).is_valid);

        let one = validate_depth_setting(1);
        assert!(one.is_valid);
        assert_eq!(one.warnings.len(), 1);

        let nine = validate_depth_setting(9);
        assert!(nine.is_valid);
        assert_eq!(nine.warnings.len(), 1);

        let zero = validate_depth_setting(0);
        assert!(!zero.is_valid);
        assert_eq!(zero.errors.len(), 1);
        assert!(!validate_depth_setting(11).is_valid);
    }
}
