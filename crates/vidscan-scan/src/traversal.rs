//! Depth-bounded async directory traversal.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};
use vidscan_core::{
    DepthHistogram, FileEntry, ScanError, ScanRequest, ScanResult, ScanWarning, ValidationReason,
};

use crate::progress::{ProgressTracker, ScanHooks, ScanProgress};
use crate::visited::VisitedSet;

/// Entries stat'ed concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Processed entries between two progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 50;

/// Async traversal engine.
///
/// The tree is walked level by level: every directory at depth `d` is
/// processed before any directory at depth `d + 1` is opened. Directory
/// entries are stat'ed in fixed-size batches whose members run concurrently
/// while the batches themselves run one after the other, so at most one
/// batch of filesystem calls is in flight per traversal.
///
/// Because a directory is always claimed at the shallowest depth it can be
/// reached from, a followed symbolic link never hides a real directory
/// behind a deeper alias.
#[derive(Debug)]
pub struct Traversal {
    batch_size: usize,
    progress_interval: u64,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl Traversal {
    /// Create a traversal with the given batch size and progress interval.
    pub fn new(batch_size: usize, progress_interval: u64) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            batch_size: batch_size.max(1),
            progress_interval: progress_interval.max(1),
            progress_tx,
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Walk `request.root` and collect every qualifying file.
    ///
    /// Only an unreadable root fails the scan; every other problem becomes a
    /// warning on the result.
    pub async fn scan(&self, request: &ScanRequest, hooks: &ScanHooks) -> Result<ScanResult, ScanError> {
        let start = Instant::now();
        let root = request.normalized_root();

        let metadata = tokio::fs::metadata(&root)
            .await
            .map_err(|e| ScanError::root_io(&root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::Invalid {
                path: root.to_string_lossy().into_owned(),
                reason: ValidationReason::NotADirectory,
            });
        }

        let listing = list_dir(&root).await.map_err(|e| ScanError::root_io(&root, e))?;

        let context = WalkContext {
            request,
            hooks,
            visited: VisitedSet::new(),
            progress: ProgressTracker::new(self.progress_interval, hooks, &self.progress_tx),
            batch_size: self.batch_size,
        };
        claim_root(&context.visited, &root, tokio::fs::canonicalize(&root).await);

        debug!("scanning {} to depth {}", root.display(), request.max_depth);
        let mut outcome = WalkOutcome::default();
        let mut level = vec![(root.clone(), listing)];
        let mut depth = 0;
        while !level.is_empty() {
            let mut subdirs = Vec::new();
            for (dir, listing) in level {
                subdirs.extend(walk_children(&context, &mut outcome, &dir, listing, depth).await);
            }
            depth += 1;
            level = open_dirs(&context, &mut outcome, subdirs).await;
        }

        // Entries reached twice must not be reported twice.
        let mut seen = HashSet::with_capacity(outcome.entries.len());
        outcome.entries.retain(|e| seen.insert(e.absolute_path.clone()));

        let result = ScanResult::new(
            root,
            request.clone(),
            outcome.entries,
            context.progress.processed(),
            outcome.histogram,
            outcome.warnings,
            start.elapsed(),
        );
        info!(
            "scanned {}: {} files in {} entries ({} skipped) in {:?}",
            result.root.display(),
            result.len(),
            result.total_visited,
            result.skipped_entries,
            result.scan_duration
        );
        Ok(result)
    }
}

impl Default for Traversal {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_PROGRESS_INTERVAL)
    }
}

/// State shared by every level of one traversal.
struct WalkContext<'a> {
    request: &'a ScanRequest,
    hooks: &'a ScanHooks,
    visited: VisitedSet,
    progress: ProgressTracker<'a>,
    batch_size: usize,
}

impl WalkContext<'_> {
    fn warn(&self, outcome: &mut WalkOutcome, warning: ScanWarning) {
        warn!("{}: {}", warning.path.display(), warning.message);
        self.hooks.warn(&warning);
        outcome.warnings.push(warning);
    }
}

/// Everything collected by one traversal.
#[derive(Debug, Default)]
struct WalkOutcome {
    entries: Vec<FileEntry>,
    histogram: DepthHistogram,
    warnings: Vec<ScanWarning>,
}

/// What one directory entry turned out to be.
enum Visit {
    File(FileEntry),
    Dir(PathBuf),
    Skip,
    Warning(ScanWarning),
}

type Listing = Vec<(PathBuf, OsString)>;

async fn list_dir(dir: &Path) -> std::io::Result<Listing> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut listing = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        listing.push((entry.path(), entry.file_name()));
    }
    Ok(listing)
}

/// Mark the root as entered so links pointing back at it are not walked.
///
/// If the root cannot be canonicalized its normalized path is claimed
/// instead; a later link resolving to the canonical form may then walk the
/// root a second time, which the final de-duplication absorbs.
fn claim_root(visited: &VisitedSet, root: &Path, canonical: std::io::Result<PathBuf>) {
    let claimed = match canonical {
        Ok(canonical) => canonical,
        Err(err) => {
            debug!("could not canonicalize root {}: {err}", root.display());
            root.to_path_buf()
        }
    };
    visited.insert(claimed);
}

/// Claim and list one subdirectory. `None` means it was already entered.
async fn open_dir(
    context: &WalkContext<'_>,
    dir: PathBuf,
) -> Result<Option<(PathBuf, Listing)>, ScanWarning> {
    let canonical = tokio::fs::canonicalize(&dir)
        .await
        .map_err(|err| ScanWarning::directory_read(&dir, &err))?;
    if !context.visited.insert(canonical) {
        debug!("already visited {}, skipping", dir.display());
        return Ok(None);
    }

    let listing = list_dir(&dir)
        .await
        .map_err(|err| ScanWarning::directory_read(&dir, &err))?;
    Ok(Some((dir, listing)))
}

/// Open the directories of the next level, in batches.
async fn open_dirs(
    context: &WalkContext<'_>,
    outcome: &mut WalkOutcome,
    dirs: Vec<PathBuf>,
) -> Vec<(PathBuf, Listing)> {
    let mut level = Vec::with_capacity(dirs.len());
    for batch in dirs.chunks(context.batch_size) {
        let opened = join_all(batch.iter().map(|dir| open_dir(context, dir.clone()))).await;
        for result in opened {
            match result {
                Ok(Some(dir)) => level.push(dir),
                Ok(None) => {}
                Err(warning) => context.warn(outcome, warning),
            }
        }
    }
    level
}

/// Process the entries of a directory sitting at `depth` and return the
/// subdirectories that still need walking.
async fn walk_children(
    context: &WalkContext<'_>,
    outcome: &mut WalkOutcome,
    dir: &Path,
    listing: Listing,
    depth: u32,
) -> Vec<PathBuf> {
    let child_depth = depth + 1;
    let request = context.request;

    let candidates: Vec<PathBuf> = listing
        .into_iter()
        .filter(|(_, name)| !request.should_skip_hidden(&name.to_string_lossy()))
        .map(|(path, _)| path)
        .collect();
    trace!("{}: {} candidates at depth {}", dir.display(), candidates.len(), child_depth);

    let mut subdirs = Vec::new();
    for batch in candidates.chunks(context.batch_size) {
        let visits = join_all(batch.iter().map(|path| visit_entry(context, path, child_depth))).await;

        for visit in visits {
            match visit {
                Visit::File(entry) => {
                    outcome.histogram.record_file(child_depth);
                    context.progress.record_found();
                    outcome.entries.push(entry);
                }
                Visit::Dir(path) => {
                    outcome.histogram.record_dir(child_depth);
                    if child_depth < request.max_depth {
                        subdirs.push(path);
                    }
                }
                Visit::Skip => {}
                Visit::Warning(warning) => context.warn(outcome, warning),
            }
        }
    }

    subdirs
}

/// Stat one entry and decide what to do with it.
async fn visit_entry(context: &WalkContext<'_>, path: &Path, depth: u32) -> Visit {
    context.progress.record_processed(path);
    let request = context.request;

    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) => return Visit::Warning(ScanWarning::entry_read(path, &err)),
    };
    let file_type = metadata.file_type();

    if file_type.is_dir() {
        return Visit::Dir(path.to_path_buf());
    }

    if file_type.is_file() {
        return accept_file(request, path, &metadata, depth, false);
    }

    if file_type.is_symlink() && request.follow_symlinks {
        let target = match tokio::fs::canonicalize(path).await {
            Ok(target) => target,
            Err(err) => return Visit::Warning(ScanWarning::symlink_resolution(path, &err)),
        };
        let target_metadata = match tokio::fs::metadata(&target).await {
            Ok(metadata) => metadata,
            Err(err) => return Visit::Warning(ScanWarning::symlink_resolution(path, &err)),
        };

        if target_metadata.is_dir() {
            // Walked through the link path; the cycle guard checks the target.
            return Visit::Dir(path.to_path_buf());
        }
        if target_metadata.is_file() {
            return accept_file(request, path, &target_metadata, depth, true);
        }
    }

    Visit::Skip
}

fn accept_file(
    request: &ScanRequest,
    path: &Path,
    metadata: &Metadata,
    depth: u32,
    via_symlink: bool,
) -> Visit {
    if depth <= request.max_depth && request.accepts_path(path) {
        Visit::File(FileEntry::from_metadata(path, metadata, depth, via_symlink))
    } else {
        Visit::Skip
    }
}
