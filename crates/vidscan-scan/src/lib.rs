//! Incremental directory scanning engine for vidscan.
//!
//! # Overview
//!
//! `vidscan-scan` finds video files below a root directory and remembers
//! what it found. Key features:
//!
//! - **Async traversal** with bounded per-batch concurrency
//! - **Depth limits**, hidden-entry filtering and optional symlink following
//!   with cycle detection
//! - **Result caching** keyed by request, with TTL expiry and path-prefix
//!   invalidation
//! - **Watcher-driven invalidation**: settled video changes drop cached
//!   scans of the affected roots
//! - **Depth preview** to recommend a depth before scanning
//!
//! # Example
//!
//! ```rust,no_run
//! use vidscan_scan::{EngineConfig, ScanEngine, ScanRequest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ScanEngine::new(EngineConfig::default());
//! let request = ScanRequest::builder().root("/videos").max_depth(3u32).build()?;
//!
//! let result = engine.scan(&request).await?;
//! println!("{} videos, {} bytes", result.len(), result.total_size());
//!
//! // Served from the cache
//! let again = engine.scan(&request).await?;
//! assert!(std::sync::Arc::ptr_eq(&result, &again));
//! # Ok(())
//! # }
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use vidscan_scan::{EngineConfig, ScanEngine};
//!
//! # async fn run() {
//! let engine = ScanEngine::new(EngineConfig::default());
//! let mut progress_rx = engine.subscribe_progress();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Processed {} entries", progress.processed_so_far);
//!     }
//! });
//! # }
//! ```

mod cache;
mod depth;
mod engine;
mod progress;
mod traversal;
mod validator;
mod visited;

pub use cache::{CacheStats, DEFAULT_CACHE_TTL, ResultCache, TtlCache, spawn_sweeper};
pub use depth::{
    Advice, DEFAULT_PREVIEW_DEPTH, DepthCheck, DepthPreview, DepthRecommendation, PreviewLevel,
    Severity, preview_depth, preview_depth_blocking, recommend_depth, validate_depth_setting,
};
pub use engine::{
    DefaultPathError, EngineCacheStats, EngineConfig, EngineConfigBuilder,
    EngineConfigBuilderError, ScanEngine, ScanOptions,
};
pub use progress::{ProgressCallback, ScanHooks, ScanProgress, WarningCallback};
pub use traversal::{DEFAULT_BATCH_SIZE, DEFAULT_PROGRESS_INTERVAL, Traversal};
pub use validator::PathValidator;
pub use visited::VisitedSet;

// Re-export core types for convenience
pub use vidscan_core::{
    FileEntry, PathValidation, ScanError, ScanRequest, ScanResult, ScanWarning, ValidationReason,
    WarningKind,
};
