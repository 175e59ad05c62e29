//! Extraction tool configuration.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;

/// Default hard timeout for one extraction run.
pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);

/// Line that separates log output from the JSON result.
pub const DEFAULT_RESULT_MARKER: &str = "Final result:";

/// How to invoke the extraction tool.
///
/// The tool is run as `program base_args... target --max-depth=N [...]`, so
/// an interpreter and script path go in `program` and `base_args`.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ExtractorConfig {
    /// Executable to spawn.
    pub program: PathBuf,

    /// Arguments placed before the target path.
    #[builder(default)]
    pub base_args: Vec<String>,

    /// The process is killed once this elapses.
    #[builder(default = "DEFAULT_EXTRACT_TIMEOUT")]
    pub timeout: Duration,

    /// Marker line preceding the JSON result.
    #[builder(default = "DEFAULT_RESULT_MARKER.to_string()")]
    pub marker: String,
}

impl ExtractorConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref program) = self.program {
            if program.as_os_str().is_empty() {
                return Err("Program cannot be empty".to_string());
            }
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err("Timeout must be positive".to_string());
        }
        if let Some(ref marker) = self.marker {
            if marker.trim().is_empty() {
                return Err("Result marker cannot be blank".to_string());
            }
        }
        Ok(())
    }
}

impl ExtractorConfig {
    /// Create a new config builder.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder::default()
    }

    /// Config for `program` with default timeout and marker.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            timeout: DEFAULT_EXTRACT_TIMEOUT,
            marker: DEFAULT_RESULT_MARKER.to_string(),
        }
    }
}
