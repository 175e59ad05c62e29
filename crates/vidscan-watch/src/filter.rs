//! Noise filtering for raw notifications.

use std::path::{Component, Path};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::WatchConfig;
use crate::error::WatchError;

/// Decides which relative names are worth debouncing.
///
/// A name is excluded when any of its components matches one of the
/// configured globs, or when it lies deeper than the session depth bound.
#[derive(Debug, Clone)]
pub struct ExcludeFilter {
    globs: GlobSet,
    max_depth: u32,
}

impl ExcludeFilter {
    /// Compile the filter for a session.
    pub fn new(config: &WatchConfig) -> Result<Self, WatchError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude_patterns {
            let glob = Glob::new(pattern).map_err(|source| WatchError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|source| WatchError::InvalidPattern {
            pattern: config.exclude_patterns.join(","),
            source,
        })?;

        Ok(Self {
            globs,
            max_depth: config.max_depth,
        })
    }

    /// Check if a name relative to the watch root should be dropped.
    pub fn is_excluded(&self, relative_name: &Path) -> bool {
        let mut depth = 0u32;
        for component in relative_name.components() {
            if let Component::Normal(name) = component {
                depth += 1;
                if self.globs.is_match(Path::new(name)) {
                    return true;
                }
            }
        }
        depth == 0 || depth > self.max_depth
    }
}
