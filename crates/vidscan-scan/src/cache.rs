//! Time-expiring result cache.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use vidscan_core::{PathValidation, ScanResult};

/// Default time-to-live for cached results.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    written_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.written_at) > ttl
    }
}

/// A concurrent string-keyed map whose entries expire after a fixed TTL.
///
/// Expired entries are dropped lazily when looked up, or in bulk by
/// [`sweep`](Self::sweep). Values are handed out as clones, so store an
/// `Arc` when the value is large.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live value. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now, self.ttl) => return Some(entry.value.clone()),
            Some(_) => {}
        }

        // Re-check under the write lock; a concurrent put may have refreshed it.
        self.entries
            .remove_if(key, |_, entry| entry.is_expired(now, self.ttl));
        None
    }

    /// Insert or overwrite a value, restarting its TTL.
    pub fn put(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                written_at: Instant::now(),
            },
        );
    }

    /// Remove a single key. Returns `true` if it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry for which `predicate(key, value)` holds.
    pub fn invalidate_where(&self, predicate: impl Fn(&str, &V) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, entry| !predicate(key, &entry.value));
        before.saturating_sub(self.entries.len())
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Evict every expired entry. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_expired(now, self.ttl));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache entry counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub scan_entries: usize,
    pub validation_entries: usize,
    pub ttl: Duration,
}

/// Scan results keyed by request, plus path validation outcomes keyed by the
/// raw path string. Both share one TTL.
#[derive(Debug)]
pub struct ResultCache {
    scans: TtlCache<Arc<ScanResult>>,
    validations: TtlCache<PathValidation>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            scans: TtlCache::new(ttl),
            validations: TtlCache::new(ttl),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.scans.ttl()
    }

    pub fn get_scan(&self, key: &str) -> Option<Arc<ScanResult>> {
        self.scans.get(key)
    }

    pub fn put_scan(&self, key: impl Into<String>, result: Arc<ScanResult>) {
        self.scans.put(key, result);
    }

    pub fn get_validation(&self, raw: &str) -> Option<PathValidation> {
        self.validations.get(raw)
    }

    pub fn put_validation(&self, raw: impl Into<String>, outcome: PathValidation) {
        self.validations.put(raw, outcome);
    }

    /// Drop scans rooted at or below `path`, and validations of such paths.
    ///
    /// Scans are matched on the root stored in the result, never on the
    /// cache key, so roots containing the key separator are handled.
    pub fn invalidate_prefix(&self, path: impl AsRef<Path>) -> usize {
        let prefix = path.as_ref();
        let removed = self.scans.invalidate_where(|_, result| result.root.starts_with(prefix))
            + self
                .validations
                .invalidate_where(|raw, _| Path::new(raw).starts_with(prefix));
        if removed > 0 {
            debug!("invalidated {} cache entries under {}", removed, prefix.display());
        }
        removed
    }

    /// Drop scans whose root contains `path`, i.e. every cached scan that
    /// could have reported it.
    pub fn invalidate_containing(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.scans
            .invalidate_where(|_, result| path.starts_with(&result.root))
    }

    pub fn clear(&self) {
        self.scans.clear();
        self.validations.clear();
    }

    /// Evict expired scans and validations.
    pub fn sweep(&self) -> usize {
        self.scans.sweep() + self.validations.sweep()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            scan_entries: self.scans.len(),
            validation_entries: self.validations.len(),
            ttl: self.ttl(),
        }
    }
}

/// Spawn the periodic sweep. The task ends once the cache is dropped.
pub fn spawn_sweeper(cache: &Arc<ResultCache>, period: Duration) -> JoinHandle<()> {
    let cache = Arc::downgrade(cache);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(cache) = cache.upgrade() else {
                break;
            };
            let evicted = cache.sweep();
            if evicted > 0 {
                debug!("cache sweep evicted {} entries", evicted);
            }
        }
    })
}
