//! The scan engine: cache, validator, traversal and watcher wired together.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use derive_builder::Builder;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vidscan_core::{
    PathValidation, ScanError, ScanRequest, ScanResult, Settings, SettingsError,
};
use vidscan_watch::{ChangeWatcher, WatchEvent};

use crate::cache::{CacheStats, DEFAULT_CACHE_TTL, ResultCache, spawn_sweeper};
use crate::progress::{ScanHooks, ScanProgress};
use crate::traversal::{DEFAULT_BATCH_SIZE, DEFAULT_PROGRESS_INTERVAL, Traversal};
use crate::validator::PathValidator;

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Lifetime of cached scans and validations.
    #[builder(default = "DEFAULT_CACHE_TTL")]
    pub cache_ttl: Duration,

    /// Entries stat'ed concurrently per batch.
    #[builder(default = "DEFAULT_BATCH_SIZE")]
    pub batch_size: usize,

    /// Processed entries between progress reports.
    #[builder(default = "DEFAULT_PROGRESS_INTERVAL")]
    pub progress_interval: u64,

    /// Period of the background sweep (defaults to the TTL).
    #[builder(default)]
    pub sweep_interval: Option<Duration>,

    /// Share one traversal between concurrent identical requests.
    #[builder(default = "true")]
    pub single_flight: bool,
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.cache_ttl == Some(Duration::ZERO) {
            return Err("Cache TTL must be positive".to_string());
        }
        if self.batch_size == Some(0) {
            return Err("Batch size must be at least 1".to_string());
        }
        if self.progress_interval == Some(0) {
            return Err("Progress interval must be at least 1".to_string());
        }
        if let Some(Some(Duration::ZERO)) = self.sweep_interval {
            return Err("Sweep interval must be positive".to_string());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new engine config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Effective sweep period.
    pub fn sweep_period(&self) -> Duration {
        self.sweep_interval.unwrap_or(self.cache_ttl)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            sweep_interval: None,
            single_flight: true,
        }
    }
}

/// Per-call scan options.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub hooks: ScanHooks,
    /// Read from the cache. A fresh result is written back either way.
    pub use_cache: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            hooks: ScanHooks::default(),
            use_cache: true,
        }
    }
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hooks(mut self, hooks: ScanHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

/// Cache statistics plus the number of traversals currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineCacheStats {
    #[serde(flatten)]
    pub cache: CacheStats,
    pub in_flight: usize,
}

/// Errors from changing the default scan path.
#[derive(Debug, Error)]
pub enum DefaultPathError {
    #[error(transparent)]
    Invalid(#[from] ScanError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Entry point for scanning.
///
/// Owns the result cache, the path validator, the traversal engine and a
/// handle to the change watcher. Settled video changes reported by the
/// watcher invalidate cached scans of the affected roots, and are then
/// re-published through [`subscribe_changes`](Self::subscribe_changes).
///
/// Must be created inside a Tokio runtime; background tasks are aborted when
/// the engine is dropped.
pub struct ScanEngine {
    config: EngineConfig,
    cache: Arc<ResultCache>,
    validator: PathValidator,
    traversal: Traversal,
    watcher: Arc<ChangeWatcher>,
    changes_tx: broadcast::Sender<WatchEvent>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl ScanEngine {
    /// Create an engine with a platform-backed watcher.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_watcher(config, Arc::new(ChangeWatcher::new()))
    }

    /// Create an engine around an existing watcher.
    pub fn with_watcher(config: EngineConfig, watcher: Arc<ChangeWatcher>) -> Self {
        let cache = Arc::new(ResultCache::new(config.cache_ttl));
        let (changes_tx, _) = broadcast::channel(100);
        let tasks = vec![
            spawn_sweeper(&cache, config.sweep_period()),
            spawn_invalidator(Arc::downgrade(&cache), watcher.subscribe(), changes_tx.clone()),
        ];

        Self {
            validator: PathValidator::new(Arc::clone(&cache)),
            traversal: Traversal::new(config.batch_size, config.progress_interval),
            config,
            cache,
            watcher,
            changes_tx,
            in_flight: DashMap::new(),
            tasks,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn watcher(&self) -> &Arc<ChangeWatcher> {
        &self.watcher
    }

    /// Subscribe to watcher events after the engine has applied them.
    ///
    /// A `VideoFileChanged` received here is already reflected in the cache,
    /// so a scan started in response never sees the stale result. Prefer this
    /// over subscribing to the watcher directly when rescanning on change.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<WatchEvent> {
        self.changes_tx.subscribe()
    }

    /// Subscribe to progress of every scan run by this engine.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ScanProgress> {
        self.traversal.subscribe()
    }

    /// Validate a candidate root (cached).
    pub async fn validate(&self, raw: &str) -> PathValidation {
        self.validator.validate(raw).await
    }

    /// Scan with default options.
    pub async fn scan(&self, request: &ScanRequest) -> Result<Arc<ScanResult>, ScanError> {
        self.scan_with(request, &ScanOptions::default()).await
    }

    /// Scan, serving the result from the cache when a live one exists.
    ///
    /// Identical requests return the same `Arc` until the entry expires or
    /// is invalidated.
    pub async fn scan_with(
        &self,
        request: &ScanRequest,
        options: &ScanOptions,
    ) -> Result<Arc<ScanResult>, ScanError> {
        let key = request.cache_key();
        if let Some(hit) = self.cached(&key, options) {
            return Ok(hit);
        }

        if !self.config.single_flight {
            return self.scan_uncached(key, request, options).await;
        }

        let gate = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _permit = gate.lock().await;
            // An identical scan may have finished while we waited.
            match self.cached(&key, options) {
                Some(hit) => Ok(hit),
                None => self.scan_uncached(key.clone(), request, options).await,
            }
        };

        drop(gate);
        self.in_flight
            .remove_if(&key, |_, gate| Arc::strong_count(gate) == 1);
        result
    }

    fn cached(&self, key: &str, options: &ScanOptions) -> Option<Arc<ScanResult>> {
        if !options.use_cache {
            return None;
        }
        let hit = self.cache.get_scan(key);
        match hit {
            Some(_) => debug!("scan cache hit: {key}"),
            None => debug!("scan cache miss: {key}"),
        }
        hit
    }

    async fn scan_uncached(
        &self,
        key: String,
        request: &ScanRequest,
        options: &ScanOptions,
    ) -> Result<Arc<ScanResult>, ScanError> {
        let raw = request.root.to_string_lossy();
        self.validator.validate(&raw).await.into_result()?;

        let result = Arc::new(self.traversal.scan(request, &options.hooks).await?);
        self.cache.put_scan(key, Arc::clone(&result));
        Ok(result)
    }

    /// Drop cached scans and validations at or below `path`.
    pub fn invalidate_root(&self, path: impl AsRef<Path>) -> usize {
        self.cache
            .invalidate_prefix(vidscan_core::normalize_path(path))
    }

    /// Drop every cached entry.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            cache: self.cache.stats(),
            in_flight: self.in_flight.len(),
        }
    }

    /// Point the settings at a new default scan directory.
    ///
    /// The path is validated, the settings are updated and saved to
    /// `settings_path`, and cached entries under the path are dropped.
    pub async fn change_default_path(
        &self,
        settings: &mut Settings,
        settings_path: &Path,
        new_path: &str,
    ) -> Result<PathBuf, DefaultPathError> {
        let path = self.validator.validate(new_path).await.into_result()?;

        settings.default_scan_path = Some(path.clone());
        settings.save(settings_path)?;
        let removed = self.invalidate_root(&path);

        info!(
            "default scan path set to {} ({} cache entries dropped)",
            path.display(),
            removed
        );
        Ok(path)
    }
}

impl Drop for ScanEngine {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ScanEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanEngine")
            .field("config", &self.config)
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

/// Invalidate cached scans whenever the watcher settles a video change, then
/// forward the event to the engine's own subscribers.
fn spawn_invalidator(
    cache: Weak<ResultCache>,
    mut events: broadcast::Receiver<WatchEvent>,
    changes: broadcast::Sender<WatchEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    let Some(cache) = cache.upgrade() else { break };
                    warn!("missed {} watch events, clearing the scan cache", missed);
                    cache.clear();
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if let WatchEvent::VideoFileChanged(change) = &event {
                let Some(cache) = cache.upgrade() else { break };
                let removed = cache.invalidate_prefix(&change.root)
                    + cache.invalidate_containing(&change.full_path);
                debug!(
                    "{} changed, {} cache entries invalidated",
                    change.full_path.display(),
                    removed
                );
            }

            // No engine subscribers is fine.
            let _ = changes.send(event);
        }
    })
}
