//! Watch statistics.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::WatchConfig;

/// Point-in-time copy of the watcher counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStats {
    /// Notifications that survived filtering.
    pub total_events: u64,
    /// Of those, notifications for video files.
    pub video_events: u64,
    pub last_event_time: Option<DateTime<Utc>>,
    pub watched_directories: usize,
    /// Time since the oldest live session started.
    pub uptime: Duration,
}

/// Overall watcher state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStatus {
    pub is_watching: bool,
    pub watched_paths: Vec<PathBuf>,
    pub session_count: usize,
    pub stats: WatchStats,
    /// Configuration applied to sessions started without one.
    pub default_config: WatchConfig,
}

/// Shared counters updated by every session task.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    total_events: AtomicU64,
    video_events: AtomicU64,
    // Milliseconds since the epoch; 0 means no event yet.
    last_event_millis: AtomicI64,
}

impl StatsCounters {
    pub(crate) fn record(&self, is_video: bool) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if is_video {
            self.video_events.fetch_add(1, Ordering::Relaxed);
        }
        self.last_event_millis
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.total_events.store(0, Ordering::Relaxed);
        self.video_events.store(0, Ordering::Relaxed);
        self.last_event_millis.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, watched_directories: usize, uptime: Duration) -> WatchStats {
        let millis = self.last_event_millis.load(Ordering::Relaxed);
        WatchStats {
            total_events: self.total_events.load(Ordering::Relaxed),
            video_events: self.video_events.load(Ordering::Relaxed),
            last_event_time: (millis != 0)
                .then(|| DateTime::from_timestamp_millis(millis))
                .flatten(),
            watched_directories,
            uptime,
        }
    }
}
