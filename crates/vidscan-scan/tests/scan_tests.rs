use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use vidscan_core::Settings;
use vidscan_scan::{
    DefaultPathError, EngineConfig, PathValidation, ScanEngine, ScanHooks, ScanOptions,
    ScanRequest, ScanResult, ValidationReason,
};
use vidscan_watch::{ChangeWatcher, ManualSource, RawEvent, WatchConfig, WatchEvent};

fn engine_with(config: EngineConfig) -> ScanEngine {
    let watcher = Arc::new(ChangeWatcher::with_source(Arc::new(ManualSource::new())));
    ScanEngine::with_watcher(config, watcher)
}

fn engine() -> ScanEngine {
    engine_with(EngineConfig::default())
}

fn names(result: &ScanResult) -> HashSet<String> {
    result.entries.iter().map(|e| e.name.to_string()).collect()
}

fn touch(path: impl AsRef<Path>) {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"video").unwrap();
}

#[tokio::test]
async fn test_extension_filter_is_case_insensitive() {
    let temp = TempDir::new().unwrap();
    touch(temp.path().join("a.mp4"));
    touch(temp.path().join("b.avi"));
    touch(temp.path().join("c.MKV"));

    let request = ScanRequest::builder()
        .root(temp.path())
        .extensions([".mp4", ".mkv"])
        .build()
        .unwrap();
    let result = engine().scan(&request).await.unwrap();

    assert_eq!(names(&result), HashSet::from(["a.mp4".into(), "c.MKV".into()]));
    let mkv = result.entries.iter().find(|e| e.name == "c.MKV").unwrap();
    assert_eq!(mkv.extension, "mkv");
    assert_eq!(mkv.depth, 1);
}

#[tokio::test]
async fn test_depth_one_only_reports_root_files() {
    let temp = TempDir::new().unwrap();
    touch(temp.path().join("top.mp4"));
    touch(temp.path().join("season1/e01.mp4"));

    let request = ScanRequest::builder()
        .root(temp.path())
        .max_depth(1u32)
        .build()
        .unwrap();
    let result = engine().scan(&request).await.unwrap();

    assert_eq!(names(&result), HashSet::from(["top.mp4".into()]));
    assert_eq!(result.max_depth_reached, 1);
}

#[tokio::test]
async fn test_library_skips_hidden_and_too_deep_files() {
    let temp = TempDir::new().unwrap();
    let videos = temp.path().join("videos");
    touch(videos.join("a.mp4"));
    touch(videos.join(".hidden/b.mp4"));
    touch(videos.join("x/y/z/w/v/c.mp4"));

    let request = ScanRequest::builder()
        .root(&videos)
        .max_depth(5u32)
        .include_hidden(false)
        .extensions([".mp4"])
        .build()
        .unwrap();
    let result = engine().scan(&request).await.unwrap();

    assert_eq!(names(&result), HashSet::from(["a.mp4".into()]));
    assert!(result.entries.iter().all(|e| e.depth <= 5));
}

#[tokio::test]
async fn test_hidden_entries_and_depth_limit() {
    let temp = TempDir::new().unwrap();
    let videos = temp.path().join("videos");
    touch(videos.join("movie.mp4"));
    touch(videos.join(".trash/old.mp4"));
    touch(videos.join(".preview.mp4"));
    touch(videos.join("a/b/c/d/e/six.mp4"));
    touch(videos.join("a/b/c/d/e/f/seven.mp4"));

    let engine = engine();
    let visible = engine
        .scan(&ScanRequest::builder().root(&videos).max_depth(6u32).build().unwrap())
        .await
        .unwrap();
    assert_eq!(
        names(&visible),
        HashSet::from(["movie.mp4".into(), "six.mp4".into()])
    );
    assert_eq!(visible.max_depth_reached, 6);

    let with_hidden = engine
        .scan(
            &ScanRequest::builder()
                .root(&videos)
                .max_depth(6u32)
                .include_hidden(true)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(with_hidden.len(), 4);
    assert!(names(&with_hidden).contains("old.mp4"));
    assert!(names(&with_hidden).contains(".preview.mp4"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_cycle_terminates() {
    let temp = TempDir::new().unwrap();
    touch(temp.path().join("clip.mp4"));
    touch(temp.path().join("nested/inner.mkv"));
    std::os::unix::fs::symlink(temp.path(), temp.path().join("nested/loop")).unwrap();

    let request = ScanRequest::builder()
        .root(temp.path())
        .max_depth(10u32)
        .follow_symlinks(true)
        .build()
        .unwrap();
    let result = engine().scan(&request).await.unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(
        names(&result),
        HashSet::from(["clip.mp4".into(), "inner.mkv".into()])
    );
}

#[tokio::test]
async fn test_cache_hit_returns_same_result() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("library");
    touch(root.join("a.mp4"));

    let engine = engine();
    let request = ScanRequest::new(&root);
    let first = engine.scan(&request).await.unwrap();

    fs::remove_dir_all(&root).unwrap();
    let second = engine.scan(&request).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(engine.cache_stats().cache.scan_entries, 1);

    // Trailing separators and dot segments hit the same entry.
    let spelled = ScanRequest::new(format!("{}/./", root.display()));
    assert!(Arc::ptr_eq(&first, &engine.scan(&spelled).await.unwrap()));
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_triggers_fresh_traversal() {
    let temp = TempDir::new().unwrap();
    touch(temp.path().join("a.mp4"));

    let engine = engine_with(
        EngineConfig::builder()
            .cache_ttl(Duration::from_secs(60))
            .build()
            .unwrap(),
    );
    let request = ScanRequest::new(temp.path());
    let first = engine.scan(&request).await.unwrap();

    touch(temp.path().join("b.mp4"));
    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(Arc::ptr_eq(&first, &engine.scan(&request).await.unwrap()));

    tokio::time::advance(Duration::from_secs(31)).await;
    let fresh = engine.scan(&request).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert_eq!(fresh.len(), 2);
}

#[tokio::test]
async fn test_invalidate_root_drops_nested_scans() {
    let temp = TempDir::new().unwrap();
    let movies = temp.path().join("movies");
    let shows = temp.path().join("shows");
    touch(movies.join("film.mp4"));
    touch(shows.join("e01.mp4"));

    let engine = engine();
    let movies_scan = engine.scan(&ScanRequest::new(&movies)).await.unwrap();
    engine.scan(&ScanRequest::new(&shows)).await.unwrap();
    assert_eq!(engine.cache_stats().cache.scan_entries, 2);

    engine.invalidate_root(&shows);
    assert_eq!(engine.cache_stats().cache.scan_entries, 1);
    assert!(Arc::ptr_eq(
        &movies_scan,
        &engine.scan(&ScanRequest::new(&movies)).await.unwrap()
    ));

    engine.invalidate_root(temp.path());
    assert_eq!(engine.cache_stats().cache.scan_entries, 0);

    engine.scan(&ScanRequest::new(&movies)).await.unwrap();
    engine.clear_cache();
    assert_eq!(engine.cache_stats().cache.scan_entries, 0);
    assert_eq!(engine.cache_stats().cache.validation_entries, 0);
}

#[tokio::test]
async fn test_bypassing_the_cache_still_refreshes_it() {
    let temp = TempDir::new().unwrap();
    touch(temp.path().join("a.mp4"));

    let engine = engine();
    let request = ScanRequest::new(temp.path());
    let cached = engine.scan(&request).await.unwrap();

    touch(temp.path().join("b.mp4"));
    let bypass = ScanOptions::new().use_cache(false);
    let fresh = engine.scan_with(&request, &bypass).await.unwrap();

    assert!(!Arc::ptr_eq(&cached, &fresh));
    assert_eq!(fresh.len(), 2);
    assert!(Arc::ptr_eq(&fresh, &engine.scan(&request).await.unwrap()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_identical_scans_share_one_traversal() {
    let temp = TempDir::new().unwrap();
    for i in 0..40 {
        touch(temp.path().join(format!("dir{}/clip{i}.mp4", i % 4)));
    }

    let request = ScanRequest::new(temp.path());
    let traversals = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&traversals);
    // Progress fires once per traversal with an interval of one entry.
    let hooks = ScanHooks::new().on_progress(move |p| {
        if p.processed_so_far == 1 {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    let options = ScanOptions::new().hooks(hooks);

    let engine = engine_with(
        EngineConfig::builder()
            .progress_interval(1u64)
            .build()
            .unwrap(),
    );
    let (a, b, c) = tokio::join!(
        engine.scan_with(&request, &options),
        engine.scan_with(&request, &options),
        engine.scan_with(&request, &options),
    );

    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&b, &c));
    assert_eq!(a.len(), 40);
    assert_eq!(traversals.load(Ordering::SeqCst), 1);
    assert_eq!(engine.cache_stats().in_flight, 0);
}

#[tokio::test]
async fn test_invalid_root_is_rejected_and_not_cached() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("clip.mp4");
    touch(&file);

    let engine = engine();
    let err = engine.scan(&ScanRequest::new(&file)).await.unwrap_err();
    assert_eq!(err.reason(), Some(ValidationReason::NotADirectory));

    let err = engine
        .scan(&ScanRequest::new(temp.path().join("missing")))
        .await
        .unwrap_err();
    assert_eq!(err.reason(), Some(ValidationReason::NotFound));
    assert_eq!(engine.cache_stats().cache.scan_entries, 0);
}

#[tokio::test]
async fn test_validation_reasons() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("clip.mp4");
    touch(&file);
    let engine = engine();

    assert_eq!(
        engine.validate("   ").await.reason(),
        Some(ValidationReason::InvalidInput)
    );
    assert_eq!(
        engine.validate(&file.to_string_lossy()).await.reason(),
        Some(ValidationReason::NotADirectory)
    );
    assert_eq!(
        engine
            .validate(&temp.path().join("nope").to_string_lossy())
            .await
            .reason(),
        Some(ValidationReason::NotFound)
    );

    let raw = format!("{}/sub/..", temp.path().display());
    fs::create_dir(temp.path().join("sub")).unwrap();
    match engine.validate(&raw).await {
        PathValidation::Valid { path } => assert_eq!(path, temp.path()),
        other => panic!("expected a valid path, got {other:?}"),
    }
    assert_eq!(engine.cache_stats().cache.validation_entries, 4);
}

#[tokio::test]
async fn test_settled_video_change_invalidates_scan() {
    let temp = TempDir::new().unwrap();
    touch(temp.path().join("a.mp4"));

    let source = Arc::new(ManualSource::new());
    let watcher = Arc::new(ChangeWatcher::with_source(source.clone()));
    watcher.update_config(
        WatchConfig::builder()
            .debounce_delay(Duration::from_millis(20))
            .build()
            .unwrap(),
    );
    let engine = ScanEngine::with_watcher(EngineConfig::default(), Arc::clone(&watcher));
    let session = watcher.start_watching(temp.path(), None).await.unwrap();

    let request = ScanRequest::new(temp.path());
    let before = engine.scan(&request).await.unwrap();
    assert_eq!(before.len(), 1);

    // Non-video changes leave the cache alone.
    touch(temp.path().join("notes.txt"));
    source.emit(&session.root, RawEvent::rename("notes.txt"));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.cache_stats().cache.scan_entries, 1);

    touch(temp.path().join("b.mp4"));
    source.emit(&session.root, RawEvent::rename("b.mp4"));

    let mut waited = Duration::ZERO;
    while engine.cache_stats().cache.scan_entries > 0 {
        assert!(waited < Duration::from_secs(5), "cache was never invalidated");
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    let after = engine.scan(&request).await.unwrap();
    assert_eq!(after.len(), 2);
    watcher.stop_all_watching().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rescan_on_engine_change_event_sees_new_file() {
    let temp = TempDir::new().unwrap();
    touch(temp.path().join("clip0.mp4"));

    let source = Arc::new(ManualSource::new());
    let watcher = Arc::new(ChangeWatcher::with_source(source.clone()));
    watcher.update_config(
        WatchConfig::builder()
            .debounce_delay(Duration::from_millis(5))
            .build()
            .unwrap(),
    );
    let engine = ScanEngine::with_watcher(EngineConfig::default(), Arc::clone(&watcher));
    let mut changes = engine.subscribe_changes();
    let session = watcher.start_watching(temp.path(), None).await.unwrap();
    let request = ScanRequest::new(temp.path());

    for i in 1..=10 {
        assert_eq!(engine.scan(&request).await.unwrap().len(), i);

        let name = format!("clip{i}.mp4");
        touch(temp.path().join(&name));
        source.emit(&session.root, RawEvent::rename(name.as_str()));

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let WatchEvent::VideoFileChanged(_) = changes.recv().await.unwrap() {
                    break;
                }
            }
        })
        .await
        .expect("no change event");

        // Rescanning straight away must not be served the pre-change result.
        assert_eq!(engine.scan(&request).await.unwrap().len(), i + 1);
    }

    watcher.stop_all_watching().await;
}

#[tokio::test]
async fn test_change_default_path() {
    let temp = TempDir::new().unwrap();
    let library = temp.path().join("library");
    fs::create_dir(&library).unwrap();
    let settings_path = temp.path().join("settings.json");

    let engine = engine();
    let mut settings = Settings::default();

    let err = engine
        .change_default_path(&mut settings, &settings_path, &temp.path().join("gone").to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(err, DefaultPathError::Invalid(_)));
    assert_eq!(settings.default_scan_path, None);
    assert!(!settings_path.exists());

    let path = engine
        .change_default_path(&mut settings, &settings_path, &library.to_string_lossy())
        .await
        .unwrap();
    assert_eq!(path, library);
    assert_eq!(settings.default_scan_path.as_deref(), Some(library.as_path()));

    let reloaded = Settings::load(&settings_path).unwrap();
    assert_eq!(reloaded.default_scan_path, Some(library.clone()));

    let request = reloaded.to_request(None).unwrap();
    assert_eq!(request.root, library);
}

#[tokio::test]
async fn test_warning_hook_reports_unreadable_symlink() {
    let temp = TempDir::new().unwrap();
    touch(temp.path().join("ok.mp4"));
    #[cfg(unix)]
    std::os::unix::fs::symlink(temp.path().join("missing"), temp.path().join("dangling")).unwrap();

    let warnings = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&warnings);
    let options = ScanOptions::new()
        .hooks(ScanHooks::new().on_warning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

    let request = ScanRequest::builder()
        .root(temp.path())
        .follow_symlinks(true)
        .build()
        .unwrap();
    let result = engine().scan_with(&request, &options).await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(warnings.load(Ordering::SeqCst), result.warnings.len() as u64);
    #[cfg(unix)]
    assert_eq!(result.warnings.len(), 1);
}
