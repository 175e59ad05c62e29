//! Subprocess runner for the extraction tool.

use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};

use itertools::Itertools;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use vidscan_core::ScanRequest;

use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use crate::record::{ExtractProgress, MediaRecord, parse_progress, parse_records};

/// Runs the external extraction tool over a directory.
///
/// The tool receives the scan parameters on its command line, reports
/// `progress: current/total` lines while it works and prints a JSON array
/// of [`MediaRecord`]s after a marker line. It runs under a hard timeout and
/// is killed when the timeout expires or the future is dropped.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    config: ExtractorConfig,
}

impl MetadataExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Arguments describing `request`, appended after the base arguments.
    pub fn args_for(&self, request: &ScanRequest) -> Vec<OsString> {
        let mut args = vec![
            request.normalized_root().into_os_string(),
            format!("--max-depth={}", request.max_depth).into(),
        ];
        if request.include_hidden {
            args.push("--include-hidden".into());
        }
        if !request.extensions.is_empty() {
            args.push(format!("--extensions={}", request.extensions.iter().join(",")).into());
        }
        args
    }

    /// Run the tool and collect its records.
    pub async fn extract(&self, request: &ScanRequest) -> Result<Vec<MediaRecord>, ExtractError> {
        self.extract_with(request, |_| {}).await
    }

    /// Run the tool, reporting each progress line to `on_progress`.
    pub async fn extract_with<F>(
        &self,
        request: &ScanRequest,
        on_progress: F,
    ) -> Result<Vec<MediaRecord>, ExtractError>
    where
        F: FnMut(ExtractProgress) + Send,
    {
        let program = &self.config.program;
        debug!("running {} on {}", program.display(), request.root.display());

        let mut child = Command::new(program)
            .args(&self.config.base_args)
            .args(self.args_for(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExtractError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let run = async {
            let (lines, errors) = tokio::try_join!(
                read_stdout(stdout, on_progress),
                read_to_string(stderr)
            )?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, lines, errors))
        };

        let outcome = tokio::time::timeout(self.config.timeout, run).await;
        let (status, lines, errors) = match outcome {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!(
                    "{} timed out after {:?}, killing it",
                    program.display(),
                    self.config.timeout
                );
                if let Err(err) = child.kill().await {
                    warn!("failed to kill {}: {}", program.display(), err);
                }
                return Err(ExtractError::Timeout {
                    timeout: self.config.timeout,
                });
            }
        };

        check_status(status, errors)?;
        let records = parse_records(&lines, &self.config.marker)?;
        info!(
            "extracted metadata for {} files under {}",
            records.len(),
            request.root.display()
        );
        Ok(records)
    }
}

async fn read_stdout<R, F>(stdout: Option<R>, mut on_progress: F) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
    F: FnMut(ExtractProgress),
{
    let Some(stdout) = stdout else {
        return Ok(Vec::new());
    };

    let mut reader = BufReader::new(stdout).lines();
    let mut lines = Vec::new();
    while let Some(line) = reader.next_line().await? {
        if let Some(progress) = parse_progress(&line) {
            on_progress(progress);
        }
        lines.push(line);
    }
    Ok(lines)
}

async fn read_to_string<R: AsyncRead + Unpin>(stream: Option<R>) -> std::io::Result<String> {
    let mut text = String::new();
    if let Some(mut stream) = stream {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await?;
        text = String::from_utf8_lossy(&bytes).into_owned();
    }
    Ok(text)
}

fn check_status(status: ExitStatus, stderr: String) -> Result<(), ExtractError> {
    if status.success() {
        return Ok(());
    }
    Err(ExtractError::Process {
        code: status.code(),
        stderr: stderr.trim().to_string(),
    })
}
