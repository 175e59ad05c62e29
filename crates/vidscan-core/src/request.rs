//! Scan request types.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::path::{is_hidden_name, normalize_extension, normalize_path};

/// Smallest accepted scan depth.
pub const MIN_SCAN_DEPTH: u32 = 1;

/// Largest accepted scan depth.
pub const MAX_SCAN_DEPTH: u32 = 10;

/// Depth used when a request does not set one.
pub const DEFAULT_SCAN_DEPTH: u32 = 5;

/// Video extensions recognized out of the box.
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v"];

/// The default allow-list as an owned set.
pub fn default_video_extensions() -> BTreeSet<String> {
    DEFAULT_VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

/// Parameters of a single traversal.
///
/// A request is immutable once built; its [`cache_key`](Self::cache_key) is
/// the identity used by the result cache.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanRequest {
    /// Directory the traversal starts from (depth 0).
    pub root: PathBuf,

    /// Deepest entry depth to report, 1..=10.
    #[builder(default = "DEFAULT_SCAN_DEPTH")]
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Include entries whose name starts with a dot.
    #[builder(default = "false")]
    #[serde(default)]
    pub include_hidden: bool,

    /// Lowercase extensions (without the dot) a file must carry to be reported.
    #[builder(setter(custom), default = "default_video_extensions()")]
    #[serde(default = "default_video_extensions")]
    pub extensions: BTreeSet<String>,

    /// Resolve symbolic links and descend into / report their targets.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_max_depth() -> u32 {
    DEFAULT_SCAN_DEPTH
}

impl ScanRequestBuilder {
    /// Set the extension allow-list. Entries are lowercased and a leading dot
    /// is dropped, so `".MKV"` and `"mkv"` are equivalent.
    pub fn extensions<I, S>(&mut self, extensions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = Some(
            extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        );
        self
    }

    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if let Some(depth) = self.max_depth {
            if !(MIN_SCAN_DEPTH..=MAX_SCAN_DEPTH).contains(&depth) {
                return Err(format!(
                    "Max depth must be between {MIN_SCAN_DEPTH} and {MAX_SCAN_DEPTH}, got {depth}"
                ));
            }
        }
        Ok(())
    }
}

impl ScanRequest {
    /// Create a new request builder.
    pub fn builder() -> ScanRequestBuilder {
        ScanRequestBuilder::default()
    }

    /// Create a request for `root` with default parameters.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_depth: DEFAULT_SCAN_DEPTH,
            include_hidden: false,
            extensions: default_video_extensions(),
            follow_symlinks: false,
        }
    }

    /// Root path after lexical normalization.
    pub fn normalized_root(&self) -> PathBuf {
        normalize_path(&self.root)
    }

    /// Deterministic serialization used as the cache key.
    ///
    /// Only parameters that change the traversal outcome take part, so two
    /// requests that differ in callbacks or progress reporting share a key.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|d={}|h={}|s={}|e={}",
            self.normalized_root().to_string_lossy(),
            self.max_depth,
            u8::from(self.include_hidden),
            u8::from(self.follow_symlinks),
            self.extensions.iter().join(","),
        )
    }

    /// Case-insensitive allow-list check for a bare extension.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions.contains(&normalize_extension(ext))
    }

    /// Allow-list check for a file path.
    pub fn accepts_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.accepts_extension(e))
    }

    /// Check if a hidden entry should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && is_hidden_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ScanRequest::builder()
            .root("/videos")
            .max_depth(3u32)
            .include_hidden(true)
            .extensions([".MP4", "mkv"])
            .build()
            .unwrap();

        assert_eq!(request.root, PathBuf::from("/videos"));
        assert_eq!(request.max_depth, 3);
        assert!(request.include_hidden);
        assert!(request.extensions.contains("mp4"));
        assert!(request.extensions.contains("mkv"));
        assert_eq!(request.extensions.len(), 2);
    }

    #[test]
    fn test_request_builder_rejects_depth_out_of_range() {
        assert!(ScanRequest::builder().root("/videos").max_depth(0u32).build().is_err());
        assert!(ScanRequest::builder().root("/videos").max_depth(11u32).build().is_err());
        assert!(ScanRequest::builder().root("").build().is_err());
        assert!(ScanRequest::builder().build().is_err());
    }

    #[test]
    fn test_request_defaults() {
        let request = ScanRequest::new("/videos");
        assert_eq!(request.max_depth, DEFAULT_SCAN_DEPTH);
        assert!(!request.include_hidden);
        assert!(!request.follow_symlinks);
        assert!(request.extensions.contains("mp4"));
    }

    #[test]
    fn test_cache_key_is_order_independent() {
        let a = ScanRequest::builder()
            .root("/videos/")
            .extensions(["mkv", "mp4"])
            .build()
            .unwrap();
        let b = ScanRequest::builder()
            .root("/videos")
            .extensions([".MP4", ".mkv"])
            .build()
            .unwrap();

        assert_eq!(a.cache_key(), b.cache_key());
        assert!(a.cache_key().starts_with("/videos|"));
    }

    #[test]
    fn test_cache_key_differs_by_parameters() {
        let base = ScanRequest::new("/videos");
        let mut deeper = base.clone();
        deeper.max_depth = 7;
        let mut hidden = base.clone();
        hidden.include_hidden = true;

        assert_ne!(base.cache_key(), deeper.cache_key());
        assert_ne!(base.cache_key(), hidden.cache_key());
    }

    #[test]
    fn test_accepts_extension_case_insensitive() {
        let request = ScanRequest::builder()
            .root("/videos")
            .extensions([".mp4", ".mkv"])
            .build()
            .unwrap();

        assert!(request.accepts_path(Path::new("/videos/a.mp4")));
        assert!(request.accepts_path(Path::new("/videos/c.MKV")));
        assert!(!request.accepts_path(Path::new("/videos/b.avi")));
        assert!(!request.accepts_path(Path::new("/videos/noext")));
    }

    #[test]
    fn test_should_skip_hidden() {
        let mut request = ScanRequest::new("/videos");
        assert!(request.should_skip_hidden(".hidden"));
        assert!(!request.should_skip_hidden("visible"));

        request.include_hidden = true;
        assert!(!request.should_skip_hidden(".hidden"));
    }
}
