//! Native notification sources.
//!
//! The watcher never talks to the OS directly. It subscribes to a
//! [`NotificationSource`], which turns whatever the platform produces into a
//! stream of [`RawEvent`]s relative to the watched root. [`NotifySource`] is
//! backed by the `notify` crate; [`ManualSource`] is fed in-process and is
//! what the tests and embedders without OS notifications use.

use std::any::Any;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use notify::event::ModifyKind;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::WatchError;

/// Coarse class of a raw notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum RawEventKind {
    /// The existence of the path may have changed (create, remove, rename).
    Rename,
    /// The content or metadata of the path changed.
    Change,
}

/// One undebounced notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    /// Name relative to the watched root.
    pub relative_name: PathBuf,
}

impl RawEvent {
    pub fn new(kind: RawEventKind, relative_name: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            relative_name: relative_name.into(),
        }
    }

    pub fn rename(relative_name: impl Into<PathBuf>) -> Self {
        Self::new(RawEventKind::Rename, relative_name)
    }

    pub fn change(relative_name: impl Into<PathBuf>) -> Self {
        Self::new(RawEventKind::Change, relative_name)
    }
}

/// Item delivered on a subscription stream.
pub type SourceItem = Result<RawEvent, WatchError>;

/// A live subscription to one root.
///
/// Dropping the subscription (or calling [`unsubscribe`](Self::unsubscribe))
/// releases the native handle.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SourceItem>,
    _handle: Option<Box<dyn Any + Send>>,
}

impl Subscription {
    /// Wrap a receiver and the handle that keeps it fed.
    pub fn new(rx: mpsc::UnboundedReceiver<SourceItem>, handle: Option<Box<dyn Any + Send>>) -> Self {
        Self {
            rx,
            _handle: handle,
        }
    }

    /// Wait for the next item; `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<SourceItem> {
        self.rx.recv().await
    }

    /// Stop receiving notifications.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("has_handle", &self._handle.is_some())
            .finish()
    }
}

/// Capability to subscribe to change notifications for a directory.
pub trait NotificationSource: Send + Sync {
    /// Start delivering notifications for everything below `root`.
    fn subscribe(&self, root: &Path) -> Result<Subscription, WatchError>;
}

/// Notifications from the platform watcher (inotify, FSEvents, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySource;

impl NotifySource {
    pub fn new() -> Self {
        Self
    }
}

impl NotificationSource for NotifySource {
    fn subscribe(&self, root: &Path) -> Result<Subscription, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let root = root.to_path_buf();
        // Backends may report resolved paths (e.g. /private/var on macOS).
        let canonical = std::fs::canonicalize(&root).ok();

        let callback_root = root.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for raw in translate(&event, &callback_root, canonical.as_deref()) {
                        if tx.send(Ok(raw)).is_err() {
                            return;
                        }
                    }
                }
                Err(source) => {
                    warn!("watcher backend error for {}: {}", callback_root.display(), source);
                    let _ = tx.send(Err(WatchError::Backend {
                        path: callback_root.clone(),
                        source,
                    }));
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|source| WatchError::Backend {
            path: root.clone(),
            source,
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Backend {
                path: root.clone(),
                source,
            })?;

        debug!("native watch registered for {}", root.display());
        Ok(Subscription::new(rx, Some(Box::new(watcher))))
    }
}

/// Map one backend event onto raw events relative to `root`.
fn translate(event: &Event, root: &Path, canonical: Option<&Path>) -> Vec<RawEvent> {
    let kind = match event.kind {
        EventKind::Access(_) => return Vec::new(),
        EventKind::Create(_) | EventKind::Remove(_) => RawEventKind::Rename,
        EventKind::Modify(ModifyKind::Name(_)) => RawEventKind::Rename,
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => RawEventKind::Change,
    };

    event
        .paths
        .iter()
        .filter_map(|path| {
            path.strip_prefix(root)
                .ok()
                .or_else(|| canonical.and_then(|c| path.strip_prefix(c).ok()))
        })
        .filter(|relative| !relative.as_os_str().is_empty())
        .map(|relative| RawEvent::new(kind, relative))
        .collect()
}

/// In-process notification source.
///
/// Events are injected with [`emit`](Self::emit) and delivered to every live
/// subscription for the same root.
#[derive(Debug, Default)]
pub struct ManualSource {
    subscribers: DashMap<PathBuf, Vec<mpsc::UnboundedSender<SourceItem>>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to subscribers of `root`. Returns how many received it.
    pub fn emit(&self, root: &Path, event: RawEvent) -> usize {
        let Some(mut senders) = self.subscribers.get_mut(root) else {
            return 0;
        };
        senders.retain(|tx| !tx.is_closed());
        senders
            .iter()
            .filter(|tx| tx.send(Ok(event.clone())).is_ok())
            .count()
    }

    /// Number of live subscriptions for `root`.
    pub fn subscriber_count(&self, root: &Path) -> usize {
        self.subscribers
            .get(root)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

impl NotificationSource for ManualSource {
    fn subscribe(&self, root: &Path) -> Result<Subscription, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(root.to_path_buf()).or_default().push(tx);
        Ok(Subscription::new(rx, None))
    }
}
