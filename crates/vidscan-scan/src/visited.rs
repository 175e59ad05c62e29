//! Cycle guard for a single traversal.

use std::path::{Path, PathBuf};

use dashmap::DashSet;

/// Tracks canonical directory paths already entered by a traversal.
///
/// A directory reachable both directly and through a followed symbolic link
/// (or a link pointing back at an ancestor) is only walked the first time its
/// canonical path is seen.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: DashSet<PathBuf>,
}

impl VisitedSet {
    /// Create a new visited set.
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Mark a canonical path. Returns `true` if this is the first visit.
    pub fn insert(&self, canonical: PathBuf) -> bool {
        self.seen.insert(canonical)
    }

    /// Check if a canonical path has been visited (without marking it).
    pub fn contains(&self, canonical: &Path) -> bool {
        self.seen.contains(canonical)
    }

    /// Get the number of directories entered.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if nothing has been visited.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
