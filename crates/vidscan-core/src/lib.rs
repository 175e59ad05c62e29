//! Core types and traits for vidscan.
//!
//! This crate provides the fundamental data structures shared by the
//! scanning engine, the change watcher and the CLI: scan requests, file
//! entries, scan results, validation outcomes and persisted settings, plus
//! the async directory inspection shared by the path validator and the
//! change watcher.

mod entry;
mod error;
mod inspect;
mod path;
mod request;
mod result;
mod settings;

pub use entry::FileEntry;
pub use error::{
    PathValidation, ScanError, ScanWarning, SettingsError, ValidationReason, WarningKind,
};
pub use inspect::inspect_directory;
pub use path::{extension_of, is_hidden_name, normalize_extension, normalize_path};
pub use request::{
    DEFAULT_SCAN_DEPTH, DEFAULT_VIDEO_EXTENSIONS, MAX_SCAN_DEPTH, MIN_SCAN_DEPTH, ScanRequest,
    ScanRequestBuilder, ScanRequestBuilderError, default_video_extensions,
};
pub use result::{DepthCounts, DepthHistogram, ScanResult};
pub use settings::{SETTINGS_FILE_NAME, Settings};
