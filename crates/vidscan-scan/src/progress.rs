//! Scan progress reporting.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use vidscan_core::ScanWarning;

/// Progress information during a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    /// Entries examined so far.
    pub processed_so_far: u64,
    /// Entry being examined when the snapshot was taken.
    pub current_path: PathBuf,
    /// Files accepted so far.
    pub found_so_far: u64,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Calculate scan rate in entries per second.
    pub fn entries_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.processed_so_far as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Callback receiving progress snapshots.
pub type ProgressCallback = Arc<dyn Fn(&ScanProgress) + Send + Sync>;

/// Callback receiving recovered errors as they happen.
pub type WarningCallback = Arc<dyn Fn(&ScanWarning) + Send + Sync>;

/// Per-call observers of a traversal.
///
/// Hooks never influence the result, so they are not part of the cache key.
#[derive(Clone, Default)]
pub struct ScanHooks {
    pub on_progress: Option<ProgressCallback>,
    pub on_warning: Option<WarningCallback>,
}

impl ScanHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the progress callback.
    pub fn on_progress(mut self, f: impl Fn(&ScanProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    /// Set the warning callback.
    pub fn on_warning(mut self, f: impl Fn(&ScanWarning) + Send + Sync + 'static) -> Self {
        self.on_warning = Some(Arc::new(f));
        self
    }

    pub(crate) fn warn(&self, warning: &ScanWarning) {
        if let Some(ref f) = self.on_warning {
            f(warning);
        }
    }
}

impl std::fmt::Debug for ScanHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanHooks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_warning", &self.on_warning.is_some())
            .finish()
    }
}

/// Shared progress counters for one traversal.
///
/// Every `interval` processed entries a snapshot is handed to the progress
/// callback and broadcast to subscribers.
pub(crate) struct ProgressTracker<'a> {
    start_time: Instant,
    interval: u64,
    processed: AtomicU64,
    found: AtomicU64,
    hooks: &'a ScanHooks,
    tx: &'a broadcast::Sender<ScanProgress>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(interval: u64, hooks: &'a ScanHooks, tx: &'a broadcast::Sender<ScanProgress>) -> Self {
        Self {
            start_time: Instant::now(),
            interval: interval.max(1),
            processed: AtomicU64::new(0),
            found: AtomicU64::new(0),
            hooks,
            tx,
        }
    }

    pub fn record_found(&self) {
        self.found.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one processed entry, reporting when the interval is reached.
    pub fn record_processed(&self, path: &std::path::Path) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if processed % self.interval == 0 {
            self.report(processed, path.to_path_buf());
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    fn report(&self, processed_so_far: u64, current_path: PathBuf) {
        let snapshot = ScanProgress {
            processed_so_far,
            current_path,
            found_so_far: self.found.load(Ordering::Relaxed),
            elapsed: self.start_time.elapsed(),
        };
        if let Some(ref f) = self.hooks.on_progress {
            f(&snapshot);
        }
        // No receivers is fine
        let _ = self.tx.send(snapshot);
    }
}
