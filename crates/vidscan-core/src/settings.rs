//! Persisted user settings.
//!
//! The settings document is shared with other tools, so unknown keys are
//! preserved verbatim across a load/save cycle.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ScanError, SettingsError};
use crate::path::normalize_extension;
use crate::request::{
    DEFAULT_SCAN_DEPTH, DEFAULT_VIDEO_EXTENSIONS, MAX_SCAN_DEPTH, MIN_SCAN_DEPTH, ScanRequest,
};

/// File name of the settings document inside the home directory.
pub const SETTINGS_FILE_NAME: &str = ".video-scanner-settings.json";

/// User settings that feed scan requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Default traversal depth.
    #[serde(default = "default_scan_depth")]
    pub scan_depth: u32,

    /// Include hidden entries.
    #[serde(default)]
    pub include_hidden: bool,

    /// Extension allow-list, with or without leading dots.
    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,

    /// Directory scanned when no path is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_scan_path: Option<PathBuf>,

    /// Keys owned by other consumers of the same document.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_scan_depth() -> u32 {
    DEFAULT_SCAN_DEPTH
}

fn default_supported_extensions() -> Vec<String> {
    DEFAULT_VIDEO_EXTENSIONS.iter().map(|e| format!(".{e}")).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_depth: DEFAULT_SCAN_DEPTH,
            include_hidden: false,
            supported_extensions: default_supported_extensions(),
            default_scan_path: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl Settings {
    /// Default settings location: `~/.video-scanner-settings.json`.
    pub fn default_location() -> Result<PathBuf, SettingsError> {
        dirs::home_dir()
            .map(|home| home.join(SETTINGS_FILE_NAME))
            .ok_or(SettingsError::NoHomeDir)
    }

    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Depth clamped into the accepted range.
    pub fn effective_depth(&self) -> u32 {
        self.scan_depth.clamp(MIN_SCAN_DEPTH, MAX_SCAN_DEPTH)
    }

    /// Build a scan request, rooted at `root` or at the default scan path.
    pub fn to_request(&self, root: Option<&Path>) -> Result<ScanRequest, ScanError> {
        let root = root
            .map(Path::to_path_buf)
            .or_else(|| self.default_scan_path.clone())
            .ok_or_else(|| ScanError::InvalidRequest {
                message: "no path given and no default scan path configured".to_string(),
            })?;

        let mut builder = ScanRequest::builder();
        builder
            .root(root)
            .max_depth(self.effective_depth())
            .include_hidden(self.include_hidden);
        if !self.supported_extensions.is_empty() {
            builder.extensions(self.supported_extensions.iter().map(|e| normalize_extension(e)));
        }

        builder.build().map_err(|e| ScanError::InvalidRequest {
            message: e.to_string(),
        })
    }
}
