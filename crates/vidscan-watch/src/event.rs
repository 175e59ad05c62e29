//! Settled watch events and their classification.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WatchConfig;
use crate::source::RawEventKind;

/// What happened to a path once its debounce window closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

/// Classify a settled notification from its last raw kind and a fresh stat.
pub fn classify(kind: RawEventKind, exists: bool) -> ChangeKind {
    match (kind, exists) {
        (RawEventKind::Rename, true) => ChangeKind::Added,
        (RawEventKind::Rename, false) => ChangeKind::Removed,
        (RawEventKind::Change, _) => ChangeKind::Modified,
    }
}

/// Payload of every settled file event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Watched root the change belongs to.
    pub root: PathBuf,
    pub relative_name: PathBuf,
    pub full_path: PathBuf,
    /// Last raw kind seen before the window closed.
    pub raw_kind: RawEventKind,
    pub kind: ChangeKind,
    pub is_video: bool,
    /// Whether the path existed when re-stat'ed.
    pub exists: bool,
    /// Size at re-stat time, for existing files.
    pub size_bytes: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// Events published by the change watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(tag = "event", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum WatchEvent {
    WatchStarted { root: PathBuf, config: WatchConfig },
    WatchStopped { root: PathBuf },
    FileChanged(FileChange),
    VideoFileChanged(FileChange),
    FileAdded(FileChange),
    VideoFileAdded(FileChange),
    FileRemoved(FileChange),
    VideoFileRemoved(FileChange),
    FileModified(FileChange),
    VideoFileModified(FileChange),
    /// The notification backend reported a failure for a session.
    Error { root: PathBuf, message: String },
}

impl WatchEvent {
    /// The file change carried by this event, if any.
    pub fn change(&self) -> Option<&FileChange> {
        match self {
            Self::FileChanged(c)
            | Self::VideoFileChanged(c)
            | Self::FileAdded(c)
            | Self::VideoFileAdded(c)
            | Self::FileRemoved(c)
            | Self::VideoFileRemoved(c)
            | Self::FileModified(c)
            | Self::VideoFileModified(c) => Some(c),
            _ => None,
        }
    }

    /// Stable event name (`"videoFileModified"`, ...).
    pub fn name(&self) -> &str {
        self.as_ref()
    }
}

impl FileChange {
    /// Build a change from a raw kind and the result of re-stat'ing the path.
    pub fn settle(
        root: PathBuf,
        relative_name: PathBuf,
        raw_kind: RawEventKind,
        size_bytes: Option<u64>,
        exists: bool,
        config: &WatchConfig,
    ) -> Self {
        let full_path = root.join(&relative_name);
        Self {
            is_video: config.is_video(&full_path),
            kind: classify(raw_kind, exists),
            root,
            relative_name,
            full_path,
            raw_kind,
            exists,
            size_bytes,
            timestamp: Utc::now(),
        }
    }

    /// Events to publish, in order: the generic change, the video change,
    /// the specific event and its video variant.
    pub fn into_events(self) -> Vec<WatchEvent> {
        let mut events = Vec::with_capacity(4);
        events.push(WatchEvent::FileChanged(self.clone()));
        if self.is_video {
            events.push(WatchEvent::VideoFileChanged(self.clone()));
        }
        let (specific, video): (fn(FileChange) -> WatchEvent, fn(FileChange) -> WatchEvent) =
            match self.kind {
                ChangeKind::Added => (WatchEvent::FileAdded, WatchEvent::VideoFileAdded),
                ChangeKind::Removed => (WatchEvent::FileRemoved, WatchEvent::VideoFileRemoved),
                ChangeKind::Modified => (WatchEvent::FileModified, WatchEvent::VideoFileModified),
            };
        if self.is_video {
            events.push(specific(self.clone()));
            events.push(video(self));
        } else {
            events.push(specific(self));
        }
        events
    }
}
