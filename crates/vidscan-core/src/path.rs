//! Path and extension helpers shared by the scanner, the cache and the watcher.

use std::path::{Component, Path, PathBuf};

use compact_str::CompactString;

/// Normalize a path lexically: make it absolute against the current
/// directory, drop `.` components, resolve `..` and strip trailing separators.
///
/// Symbolic links are not resolved; two spellings of the same directory
/// through different links stay distinct here.
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Lowercase an extension and strip a leading dot (`".MKV"` -> `"mkv"`).
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Lowercased extension of a path, if any.
pub fn extension_of(path: impl AsRef<Path>) -> Option<CompactString> {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| CompactString::new(e.to_lowercase()))
}

/// Hidden entries are the ones whose name starts with a dot.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_resolves_dots() {
        let normalized = normalize_path("/videos/./movies/../shows/");
        assert_eq!(normalized, PathBuf::from("/videos/shows"));
    }

    #[test]
    fn test_normalize_path_makes_absolute() {
        let normalized = normalize_path("relative/dir");
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("relative/dir"));
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".MKV"), "mkv");
        assert_eq!(normalize_extension("mp4"), "mp4");
        assert_eq!(normalize_extension(" .Avi "), "avi");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("/a/b/c.MKV").as_deref(), Some("mkv"));
        assert_eq!(extension_of("/a/b/noext"), None);
    }
}
