//! Media metadata extraction for vidscan.
//!
//! Technical metadata (resolution, frame rate, codec, ...) is produced by an
//! external tool. This crate runs that tool as a subprocess with a hard
//! timeout, forwards its progress reports and parses the records it prints.
//!
//! # Example
//!
//! ```rust,no_run
//! use vidscan_core::ScanRequest;
//! use vidscan_probe::{ExtractorConfig, MetadataExtractor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExtractorConfig::builder()
//!     .program("python3")
//!     .base_args(vec!["video_info.py".to_string()])
//!     .build()?;
//! let extractor = MetadataExtractor::new(config);
//!
//! let records = extractor
//!     .extract_with(&ScanRequest::new("/videos"), |p| {
//!         println!("{}/{}", p.current, p.total);
//!     })
//!     .await?;
//! println!("{} records", records.len());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod extractor;
mod record;

pub use config::{
    DEFAULT_EXTRACT_TIMEOUT, DEFAULT_RESULT_MARKER, ExtractorConfig, ExtractorConfigBuilder,
    ExtractorConfigBuilderError,
};
pub use error::ExtractError;
pub use extractor::MetadataExtractor;
pub use record::{ExtractProgress, MediaRecord, parse_progress, parse_records};
