use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use vidscan_core::{
    DepthHistogram, FileEntry, PathValidation, ScanError, ScanRequest, ScanResult, ScanWarning,
    Settings, ValidationReason, WarningKind, inspect_directory,
};

#[test]
fn test_cache_key_ignores_extension_spelling() {
    let a = ScanRequest::builder()
        .root("/videos/./library")
        .max_depth(4u32)
        .extensions(["MKV", ".mp4"])
        .build()
        .unwrap();
    let b = ScanRequest::builder()
        .root("/videos/library/")
        .max_depth(4u32)
        .extensions(["mp4", "mkv"])
        .build()
        .unwrap();

    assert_eq!(a.cache_key(), b.cache_key());
    assert!(a.cache_key().starts_with("/videos/library|"));
}

#[test]
fn test_follow_symlinks_changes_key() {
    let plain = ScanRequest::new("/videos");
    let mut follow = plain.clone();
    follow.follow_symlinks = true;

    assert_ne!(plain.cache_key(), follow.cache_key());
}

#[test]
fn test_scan_result_assembly() {
    let temp = TempDir::new().unwrap();
    let shallow = temp.path().join("a.mp4");
    std::fs::create_dir(temp.path().join("sub")).unwrap();
    let deep = temp.path().join("sub/b.mkv");
    std::fs::write(&shallow, b"aaaa").unwrap();
    std::fs::write(&deep, b"bb").unwrap();

    let entries = vec![
        FileEntry::from_metadata(&shallow, &std::fs::metadata(&shallow).unwrap(), 1, false),
        FileEntry::from_metadata(&deep, &std::fs::metadata(&deep).unwrap(), 2, false),
    ];

    let mut histogram = DepthHistogram::new();
    histogram.record_file(1);
    histogram.record_dir(1);
    histogram.record_file(2);

    let warning = ScanWarning::new("/nowhere", "gone", WarningKind::DirectoryRead);
    let result = ScanResult::new(
        temp.path().to_path_buf(),
        ScanRequest::new(temp.path()),
        entries,
        3,
        histogram,
        vec![warning],
        Duration::from_millis(5),
    );

    assert_eq!(result.len(), 2);
    assert_eq!(result.max_depth_reached, 2);
    assert_eq!(result.total_size(), 6);
    assert_eq!(result.skipped_entries, 1);
    assert!(result.has_warnings());
    assert_eq!(result.depth_histogram.total_files(), 2);
}

#[test]
fn test_validation_serializes_with_status_tag() {
    let invalid = PathValidation::Invalid {
        path: "/missing".to_string(),
        reason: ValidationReason::NotFound,
    };
    let json = serde_json::to_value(&invalid).unwrap();

    assert_eq!(json["status"], "invalid");
    assert_eq!(json["reason"], "NotFound");
}

#[test]
fn test_scan_error_messages() {
    let err = ScanError::Invalid {
        path: "/etc/passwd".to_string(),
        reason: ValidationReason::NotADirectory,
    };
    assert_eq!(err.to_string(), "Path is not a directory: /etc/passwd");
    assert_eq!(err.reason(), Some(ValidationReason::NotADirectory));
}

#[test]
fn test_settings_defaults_feed_request() {
    let temp = TempDir::new().unwrap();
    let settings = Settings {
        default_scan_path: Some(temp.path().to_path_buf()),
        ..Settings::default()
    };

    let request = settings.to_request(None).unwrap();
    assert_eq!(request.max_depth, 5);
    assert!(request.accepts_extension("webm"));
    assert!(!request.include_hidden);
    assert_eq!(request.root, PathBuf::from(temp.path()));
}

#[tokio::test]
async fn test_inspect_normalizes_valid_path() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("movies")).unwrap();
    let raw = format!("{}/movies/./", temp.path().display());

    match inspect_directory(&raw).await {
        PathValidation::Valid { path } => assert!(path.ends_with("movies")),
        other => panic!("expected a valid directory, got {other:?}"),
    }
}
