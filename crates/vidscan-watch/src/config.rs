//! Watch session configuration.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use vidscan_core::{default_video_extensions, extension_of, normalize_extension};

/// Debounce delay used when none is configured.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(1000);

/// Deepest notification depth reported by default.
pub const DEFAULT_WATCH_DEPTH: u32 = 5;

/// Names never worth reporting: version control, dependency trees, editor
/// swap files and OS metadata.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    ".git",
    ".svn",
    "node_modules",
    "*.tmp",
    "*.temp",
    "*.swp",
    "*~",
    "Thumbs.db",
    ".DS_Store",
];

/// Configuration for one watch session.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct WatchConfig {
    /// Quiet period a path must observe before its change is settled.
    #[builder(default = "DEFAULT_DEBOUNCE_DELAY")]
    #[serde(default = "default_debounce_delay")]
    pub debounce_delay: Duration,

    /// Notifications more than this many components below the root are dropped.
    #[builder(default = "DEFAULT_WATCH_DEPTH")]
    #[serde(default = "default_watch_depth")]
    pub max_depth: u32,

    /// Glob patterns matched against every component of a relative name.
    #[builder(default = "default_exclude_patterns()")]
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Extensions that make a file a video file.
    #[builder(setter(custom), default = "default_video_extensions()")]
    #[serde(default = "default_video_extensions")]
    pub video_extensions: BTreeSet<String>,
}

fn default_debounce_delay() -> Duration {
    DEFAULT_DEBOUNCE_DELAY
}

fn default_watch_depth() -> u32 {
    DEFAULT_WATCH_DEPTH
}

fn default_exclude_patterns() -> Vec<String> {
    DEFAULT_EXCLUDE_PATTERNS.iter().map(|p| p.to_string()).collect()
}

impl WatchConfigBuilder {
    /// Set the video extension set. Leading dots and case are ignored.
    pub fn video_extensions<I, S>(&mut self, extensions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.video_extensions = Some(
            extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        );
        self
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_depth == Some(0) {
            return Err("Watch depth must be at least 1".to_string());
        }
        if let Some(ref patterns) = self.exclude_patterns {
            for pattern in patterns {
                globset::Glob::new(pattern)
                    .map_err(|e| format!("Invalid exclude pattern {pattern:?}: {e}"))?;
            }
        }
        Ok(())
    }
}

impl WatchConfig {
    /// Create a new watch config builder.
    pub fn builder() -> WatchConfigBuilder {
        WatchConfigBuilder::default()
    }

    /// Check if a path names a video file.
    pub fn is_video(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.video_extensions.contains(ext.as_str()))
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_delay: DEFAULT_DEBOUNCE_DELAY,
            max_depth: DEFAULT_WATCH_DEPTH,
            exclude_patterns: default_exclude_patterns(),
            video_extensions: default_video_extensions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.debounce_delay, Duration::from_millis(1000));
        assert_eq!(config.max_depth, 5);
        assert!(config.exclude_patterns.iter().any(|p| p == ".git"));
        assert_eq!(config, WatchConfig::builder().build().unwrap());
    }

    #[test]
    fn test_config_builder() {
        let config = WatchConfig::builder()
            .debounce_delay(Duration::from_millis(250))
            .max_depth(2u32)
            .video_extensions([".MP4"])
            .build()
            .unwrap();

        assert_eq!(config.debounce_delay, Duration::from_millis(250));
        assert!(config.is_video(Path::new("clip.mp4")));
        assert!(!config.is_video(Path::new("clip.mkv")));
    }

    #[test]
    fn test_config_validation() {
        assert!(WatchConfig::builder().max_depth(0u32).build().is_err());
        assert!(
            WatchConfig::builder()
                .exclude_patterns(vec!["[unclosed".to_string()])
                .build()
                .is_err()
        );
    }
}
