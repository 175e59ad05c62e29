//! The change watcher and its per-root sessions.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};
use vidscan_core::{PathValidation, inspect_directory, normalize_path};

use crate::config::WatchConfig;
use crate::debounce::{DebounceKey, PendingDebounce, PendingTimer};
use crate::error::WatchError;
use crate::event::{FileChange, WatchEvent};
use crate::filter::ExcludeFilter;
use crate::source::{NotificationSource, NotifySource, RawEvent, Subscription};
use crate::stats::{StatsCounters, WatchStats, WatchStatus};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum StopOutcome {
    Stopped,
    NotFound,
}

impl StopOutcome {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Public description of a live session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub root: PathBuf,
    pub config: WatchConfig,
    pub started_at: DateTime<Utc>,
}

struct WatchSession {
    info: SessionInfo,
    started: Instant,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Watches directories and publishes debounced, classified change events.
///
/// Each watched root runs its own session task that owns the native
/// subscription and the pending debounce table. Stopping a session cancels
/// its task, which drops every pending timer with it.
///
/// ```rust,no_run
/// use vidscan_watch::{ChangeWatcher, WatchEvent};
///
/// # async fn run() -> Result<(), vidscan_watch::WatchError> {
/// let watcher = ChangeWatcher::new();
/// let mut events = watcher.subscribe();
/// watcher.start_watching("/videos", None).await?;
///
/// while let Ok(event) = events.recv().await {
///     if let WatchEvent::VideoFileAdded(change) = event {
///         println!("new video: {}", change.full_path.display());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ChangeWatcher {
    source: Arc<dyn NotificationSource>,
    default_config: RwLock<WatchConfig>,
    sessions: DashMap<PathBuf, WatchSession>,
    counters: Arc<StatsCounters>,
    events_tx: broadcast::Sender<WatchEvent>,
}

impl ChangeWatcher {
    /// Create a watcher backed by the platform notification API.
    pub fn new() -> Self {
        Self::with_source(Arc::new(NotifySource::new()))
    }

    /// Create a watcher over an arbitrary notification source.
    pub fn with_source(source: Arc<dyn NotificationSource>) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source,
            default_config: RwLock::new(WatchConfig::default()),
            sessions: DashMap::new(),
            counters: Arc::new(StatsCounters::default()),
            events_tx,
        }
    }

    /// Subscribe to watch events.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events_tx.subscribe()
    }

    /// Configuration used by sessions started without an explicit one.
    pub fn default_config(&self) -> WatchConfig {
        self.default_config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the default configuration. Live sessions keep theirs.
    pub fn update_config(&self, config: WatchConfig) {
        info!(
            "watch defaults updated: debounce {:?}, depth {}",
            config.debounce_delay, config.max_depth
        );
        *self
            .default_config
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Start watching `path`.
    ///
    /// The path must be an existing, readable directory. A session already
    /// running for the same root is stopped first.
    pub async fn start_watching(
        &self,
        path: impl AsRef<Path>,
        config: Option<WatchConfig>,
    ) -> Result<SessionInfo, WatchError> {
        let raw = path.as_ref().to_string_lossy().into_owned();
        let root = match inspect_directory(&raw).await {
            PathValidation::Valid { path } => path,
            PathValidation::Invalid { path, reason } => {
                return Err(WatchError::InvalidWatchTarget { path, reason });
            }
        };

        if self.sessions.contains_key(&root) {
            debug!("restarting watch on {}", root.display());
            self.stop_watching(&root).await;
        }

        let config = config.unwrap_or_else(|| self.default_config());
        let filter = ExcludeFilter::new(&config)?;
        let subscription = self.source.subscribe(&root)?;

        let info = SessionInfo {
            root: root.clone(),
            config: config.clone(),
            started_at: Utc::now(),
        };
        let cancel = CancellationToken::new();
        let context = SessionContext {
            root: root.clone(),
            config,
            filter,
            counters: Arc::clone(&self.counters),
            events: self.events_tx.clone(),
        };
        let task = tokio::spawn(run_session(context, subscription, cancel.clone()));

        let session = WatchSession {
            info: info.clone(),
            started: Instant::now(),
            cancel,
            task,
        };
        if let Some(previous) = self.sessions.insert(root.clone(), session) {
            // Lost a race with a concurrent start for the same root.
            previous.cancel.cancel();
        }

        info!("watching {}", root.display());
        let _ = self.events_tx.send(WatchEvent::WatchStarted {
            root,
            config: info.config.clone(),
        });
        Ok(info)
    }

    /// Stop watching `path`, cancelling its pending timers.
    pub async fn stop_watching(&self, path: impl AsRef<Path>) -> StopOutcome {
        let root = normalize_path(path);
        let Some((_, session)) = self.sessions.remove(&root) else {
            return StopOutcome::NotFound;
        };

        session.cancel.cancel();
        if let Err(err) = session.task.await {
            error!("watch session for {} ended abnormally: {}", root.display(), err);
        }

        info!("stopped watching {}", root.display());
        let _ = self.events_tx.send(WatchEvent::WatchStopped { root });
        StopOutcome::Stopped
    }

    /// Stop every session.
    pub async fn stop_all_watching(&self) -> Vec<(PathBuf, StopOutcome)> {
        let mut outcomes = Vec::new();
        for root in self.watched_paths() {
            let outcome = self.stop_watching(&root).await;
            outcomes.push((root, outcome));
        }
        if !outcomes.is_empty() {
            info!("stopped all {} watch sessions", outcomes.len());
        }
        outcomes
    }

    /// Check if `path` has a live session.
    pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        self.sessions.contains_key(&normalize_path(path))
    }

    /// Roots with a live session, sorted.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.sessions.iter().map(|s| s.key().clone()).collect();
        paths.sort();
        paths
    }

    /// Descriptions of the live sessions.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> =
            self.sessions.iter().map(|s| s.info.clone()).collect();
        sessions.sort_by(|a, b| a.root.cmp(&b.root));
        sessions
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> WatchStats {
        let uptime = self
            .sessions
            .iter()
            .map(|s| s.started.elapsed())
            .max()
            .unwrap_or(Duration::ZERO);
        self.counters.snapshot(self.sessions.len(), uptime)
    }

    /// Full watcher status.
    pub fn status(&self) -> WatchStatus {
        let watched_paths = self.watched_paths();
        WatchStatus {
            is_watching: !watched_paths.is_empty(),
            session_count: watched_paths.len(),
            watched_paths,
            stats: self.stats(),
            default_config: self.default_config(),
        }
    }

    /// Zero the event counters.
    pub fn reset_stats(&self) {
        self.counters.reset();
    }
}

impl Default for ChangeWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        for session in self.sessions.iter() {
            session.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("watched_paths", &self.watched_paths())
            .finish_non_exhaustive()
    }
}

/// State owned by one session task.
struct SessionContext {
    root: PathBuf,
    config: WatchConfig,
    filter: ExcludeFilter,
    counters: Arc<StatsCounters>,
    events: broadcast::Sender<WatchEvent>,
}

impl SessionContext {
    fn accept(&self, pending: &mut PendingDebounce, raw: RawEvent) {
        if self.filter.is_excluded(&raw.relative_name) {
            trace!("ignoring {}", raw.relative_name.display());
            return;
        }

        self.counters.record(self.config.is_video(&raw.relative_name));

        let key = DebounceKey::new(&self.root, raw.relative_name);
        if pending.arm(key, raw.kind, Instant::now()) {
            trace!("debounce re-armed under {}", self.root.display());
        }
    }

    async fn settle(&self, key: DebounceKey, timer: PendingTimer) {
        let metadata = tokio::fs::metadata(key.full_path()).await.ok();
        let size_bytes = metadata.as_ref().filter(|m| m.is_file()).map(|m| m.len());

        let change = FileChange::settle(
            key.root,
            key.relative_name,
            timer.kind,
            size_bytes,
            metadata.is_some(),
            &self.config,
        );
        debug!(
            "{} {} ({} raw, video: {})",
            change.kind,
            change.full_path.display(),
            timer.hits,
            change.is_video
        );

        for event in change.into_events() {
            let _ = self.events.send(event);
        }
    }
}

async fn sleep_until_next(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_session(
    context: SessionContext,
    mut subscription: Subscription,
    cancel: CancellationToken,
) {
    let mut pending = PendingDebounce::new(context.config.debounce_delay);
    let mut stream_open = true;

    loop {
        if !stream_open && pending.is_empty() {
            break;
        }
        let next = pending.next_deadline();

        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            item = subscription.recv(), if stream_open => match item {
                Some(Ok(raw)) => context.accept(&mut pending, raw),
                Some(Err(err)) => {
                    error!("{}", err);
                    let _ = context.events.send(WatchEvent::Error {
                        root: context.root.clone(),
                        message: err.to_string(),
                    });
                }
                None => {
                    debug!("notification stream closed for {}", context.root.display());
                    stream_open = false;
                }
            },

            _ = sleep_until_next(next) => {
                for (key, timer) in pending.take_expired(Instant::now()) {
                    context.settle(key, timer).await;
                }
            }
        }
    }

    let dropped = pending.len();
    pending.clear();
    subscription.unsubscribe();
    if dropped > 0 {
        debug!(
            "cancelled {} pending timers for {}",
            dropped,
            context.root.display()
        );
    }
}
