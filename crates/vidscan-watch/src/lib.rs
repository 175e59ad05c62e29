//! Debounced filesystem change watching for vidscan.
//!
//! # Overview
//!
//! `vidscan-watch` turns raw platform notifications into settled,
//! classified events:
//!
//! - **Filtering** of version-control, temp and OS metadata names, plus a
//!   per-session depth bound
//! - **Debouncing** per `(root, relative name)`: a burst of notifications
//!   settles once, one quiet period after the last of them
//! - **Classification** into added / removed / modified, with video-specific
//!   variants, after re-stat'ing the path
//! - **Statistics** on filtered notifications
//!
//! Notification backends are abstracted behind [`NotificationSource`], so the
//! whole pipeline runs against [`ManualSource`] in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use vidscan_watch::{ChangeWatcher, WatchConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let watcher = ChangeWatcher::new();
//! let config = WatchConfig::builder()
//!     .debounce_delay(Duration::from_millis(500))
//!     .build()?;
//!
//! let mut events = watcher.subscribe();
//! watcher.start_watching("/videos", Some(config)).await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod debounce;
mod error;
mod event;
mod filter;
mod source;
mod stats;
mod watcher;

pub use config::{
    DEFAULT_DEBOUNCE_DELAY, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_WATCH_DEPTH, WatchConfig,
    WatchConfigBuilder, WatchConfigBuilderError,
};
pub use debounce::{DebounceKey, PendingDebounce, PendingTimer};
pub use error::WatchError;
pub use event::{ChangeKind, FileChange, WatchEvent, classify};
pub use filter::ExcludeFilter;
pub use source::{
    ManualSource, NotificationSource, NotifySource, RawEvent, RawEventKind, SourceItem,
    Subscription,
};
pub use stats::{WatchStats, WatchStatus};
pub use watcher::{ChangeWatcher, SessionInfo, StopOutcome};
