//! vidscan - incremental video library scanner.
//!
//! Usage:
//!   vidscan scan [PATH]                 Find video files (cached, depth-bounded)
//!   vidscan watch [PATH]                Stream settled file changes
//!   vidscan preview [PATH]              Preview a tree and recommend a scan depth
//!   vidscan probe [PATH] --program P    Run the metadata extraction tool
//!   vidscan settings <ACTION>           Show or change saved settings
//!   vidscan --help                      Show help

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use vidscan_core::{ScanRequest, Settings};
use vidscan_probe::{ExtractorConfig, MetadataExtractor};
use vidscan_scan::{
    DEFAULT_PREVIEW_DEPTH, EngineConfig, ScanEngine, ScanHooks, ScanOptions, preview_depth,
    recommend_depth, validate_depth_setting,
};
use vidscan_watch::{WatchConfig, WatchEvent};

#[derive(Parser)]
#[command(
    name = "vidscan",
    version,
    about = "Incremental video library scanner",
    long_about = "vidscan finds video files below a directory, caches what it found \
                  and watches the tree for changes.\n\n\
                  Commands without a PATH use the default scan path from the settings file."
)]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Settings file (defaults to ~/.video-scanner-settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory for video files
    Scan {
        /// Directory to scan
        path: Option<PathBuf>,

        /// Maximum depth below the root (1-10)
        #[arg(short, long)]
        depth: Option<u32>,

        /// Include hidden files and directories
        #[arg(long)]
        hidden: bool,

        /// Follow symbolic links
        #[arg(short = 'L', long)]
        follow_symlinks: bool,

        /// Extensions to accept (repeatable, e.g. -e mp4 -e mkv)
        #[arg(short, long = "ext")]
        extensions: Vec<String>,

        /// Number of largest files to list
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,
    },

    /// Watch a directory and print settled changes
    Watch {
        /// Directory to watch
        path: Option<PathBuf>,

        /// Quiet period before a change is reported, in milliseconds
        #[arg(long, default_value = "1000")]
        debounce_ms: u64,

        /// Ignore changes deeper than this below the root
        #[arg(short, long, default_value = "5")]
        depth: u32,

        /// Rescan after every settled video change
        #[arg(long)]
        rescan: bool,
    },

    /// Preview the directory structure and recommend a scan depth
    Preview {
        /// Directory to preview
        path: Option<PathBuf>,

        /// How deep to look
        #[arg(short, long, default_value_t = DEFAULT_PREVIEW_DEPTH)]
        depth: u32,
    },

    /// Extract technical metadata with an external tool
    Probe {
        /// Directory to probe
        path: Option<PathBuf>,

        /// Extraction program
        #[arg(long)]
        program: PathBuf,

        /// Arguments passed before the target path (repeatable)
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,

        /// Kill the tool after this many seconds
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Maximum depth below the root (1-10)
        #[arg(short, long)]
        depth: Option<u32>,
    },

    /// Show or change saved settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings
    Show,

    /// Set the default scan depth
    SetDepth { depth: u32 },

    /// Set the default scan directory
    SetDefaultPath { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let settings_path = match cli.settings {
        Some(path) => path,
        None => Settings::default_location()?,
    };
    let settings = Settings::load(&settings_path).context("Failed to load settings")?;

    match cli.command {
        Command::Scan {
            path,
            depth,
            hidden,
            follow_symlinks,
            extensions,
            top,
        } => {
            let request = build_request(
                &settings,
                path.as_deref(),
                depth,
                hidden,
                follow_symlinks,
                &extensions,
            )?;
            run_scan(&request, top, cli.json).await?;
        }
        Command::Watch {
            path,
            debounce_ms,
            depth,
            rescan,
        } => {
            let request = settings.to_request(path.as_deref())?;
            let config = WatchConfig::builder()
                .debounce_delay(Duration::from_millis(debounce_ms))
                .max_depth(depth)
                .build()?;
            run_watch(&request, config, rescan, cli.json).await?;
        }
        Command::Preview { path, depth } => {
            let request = settings.to_request(path.as_deref())?;
            run_preview(&request.root, depth, cli.json).await?;
        }
        Command::Probe {
            path,
            program,
            args,
            timeout,
            depth,
        } => {
            let request = build_request(&settings, path.as_deref(), depth, false, false, &[])?;
            let config = ExtractorConfig::builder()
                .program(program)
                .base_args(args)
                .timeout(Duration::from_secs(timeout))
                .build()?;
            run_probe(&request, config, cli.json).await?;
        }
        Command::Settings { action } => {
            run_settings(settings, &settings_path, action, cli.json).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vidscan=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge command-line overrides into the saved settings.
fn build_request(
    settings: &Settings,
    path: Option<&Path>,
    depth: Option<u32>,
    hidden: bool,
    follow_symlinks: bool,
    extensions: &[String],
) -> Result<ScanRequest> {
    let base = settings
        .to_request(path)
        .context("No directory given and no default scan path saved")?;

    let mut builder = ScanRequest::builder();
    builder
        .root(base.root)
        .max_depth(depth.unwrap_or(base.max_depth))
        .include_hidden(hidden || base.include_hidden)
        .follow_symlinks(follow_symlinks);
    if extensions.is_empty() {
        builder.extensions(base.extensions);
    } else {
        builder.extensions(extensions);
    }
    Ok(builder.build()?)
}

/// Scan and print the largest files.
async fn run_scan(request: &ScanRequest, top_n: usize, json: bool) -> Result<()> {
    let engine = ScanEngine::new(EngineConfig::default());

    eprintln!("Scanning {}...", request.root.display());
    let hooks = ScanHooks::new().on_progress(|p| {
        eprint!("\r {} entries, {} videos", p.processed_so_far, p.found_so_far);
    });
    let result = engine
        .scan_with(request, &ScanOptions::new().hooks(hooks))
        .await
        .context("Scan failed")?;
    eprintln!();

    if json {
        println!("{}", serde_json::to_string_pretty(&*result)?);
        return Ok(());
    }

    println!();
    println!("{}", "─".repeat(60));
    println!(" {} - {}", result.root.display(), format_size(result.total_size()));
    println!(
        " {} videos in {} entries, deepest at level {}",
        result.len(),
        result.total_visited,
        result.max_depth_reached
    );
    println!(" Scanned in {:.2}s", result.scan_duration.as_secs_f64());
    println!("{}", "─".repeat(60));
    println!();

    let mut entries: Vec<_> = result.entries.iter().collect();
    entries.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
    for entry in entries.iter().take(top_n) {
        let relative = entry
            .absolute_path
            .strip_prefix(&result.root)
            .unwrap_or(&entry.absolute_path);
        println!("  {:>10}  {}", format_size(entry.size_bytes), relative.display());
    }
    if entries.len() > top_n {
        println!("  ... and {} more", entries.len() - top_n);
    }

    if result.has_warnings() {
        println!();
        println!("{} warning(s) during scan", result.warnings.len());
    }

    Ok(())
}

/// Stream settled events until interrupted.
async fn run_watch(request: &ScanRequest, config: WatchConfig, rescan: bool, json: bool) -> Result<()> {
    let engine = ScanEngine::new(EngineConfig::default());
    let watcher = engine.watcher();
    // Events arrive here only after the engine has invalidated the cache.
    let mut events = engine.subscribe_changes();

    let session = watcher
        .start_watching(&request.root, Some(config))
        .await
        .context("Failed to start watching")?;
    eprintln!("Watching {} (Ctrl-C to stop)", session.root.display());

    if rescan {
        let result = engine.scan(request).await?;
        eprintln!("{} videos", result.len());
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        eprintln!("missed {missed} events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                print_event(&event, json)?;

                if rescan && matches!(event, WatchEvent::VideoFileChanged(_)) {
                    let result = engine.scan(request).await?;
                    eprintln!("{} videos", result.len());
                }
            }
        }
    }

    watcher.stop_all_watching().await;
    let stats = watcher.stats();
    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        eprintln!(
            "{} notifications ({} for videos)",
            stats.total_events, stats.video_events
        );
    }
    Ok(())
}

fn print_event(event: &WatchEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        WatchEvent::WatchStarted { root, .. } | WatchEvent::WatchStopped { root } => {
            println!("{:<18} {}", event.name(), root.display());
        }
        WatchEvent::Error { root, message } => {
            println!("{:<18} {}: {}", event.name(), root.display(), message);
        }
        _ => {
            if let Some(change) = event.change() {
                let size = change.size_bytes.map(format_size).unwrap_or_default();
                println!(
                    "{:<18} {} {}",
                    event.name(),
                    change.relative_name.display(),
                    size
                );
            }
        }
    }
    Ok(())
}

async fn run_preview(root: &Path, depth: u32, json: bool) -> Result<()> {
    let preview = preview_depth(root, depth).await.context("Preview failed")?;
    let recommendation = recommend_depth(&preview);

    if json {
        let report = serde_json::json!({
            "preview": preview,
            "recommendation": recommendation,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{}: {} directories, {} files within depth {}",
        preview.root.display(),
        preview.total_directories,
        preview.estimated_files,
        preview.max_depth
    );
    for (level, counts) in &preview.levels {
        println!(
            "  level {:>2}: {:>6} dirs {:>8} files",
            level, counts.directories, counts.files
        );
    }
    println!();
    println!("Recommended depth: {}", recommendation.recommended_depth);
    for advice in &recommendation.advice {
        println!("  [{}] {}", advice.severity, advice.message);
    }
    for warning in &preview.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

async fn run_probe(request: &ScanRequest, config: ExtractorConfig, json: bool) -> Result<()> {
    let extractor = MetadataExtractor::new(config);
    let records = extractor
        .extract_with(request, |p| {
            eprint!("\r {}/{} ({:.0}%)", p.current, p.total, p.fraction() * 100.0);
        })
        .await
        .context("Metadata extraction failed")?;
    eprintln!();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  {}  {}  {}",
            record.name,
            record.resolution.as_deref().unwrap_or("?"),
            record.codec.as_deref().unwrap_or("?"),
            record.duration_seconds.map(|d| format!("{d:.1}s")).unwrap_or_default(),
        );
    }
    println!("{} files", records.len());
    Ok(())
}

async fn run_settings(
    mut settings: Settings,
    settings_path: &Path,
    action: SettingsAction,
    json: bool,
) -> Result<()> {
    match action {
        SettingsAction::Show => {}
        SettingsAction::SetDepth { depth } => {
            let check = validate_depth_setting(depth);
            for warning in &check.warnings {
                eprintln!("warning: {warning}");
            }
            if !check.is_valid {
                bail!("{}", check.errors.join("; "));
            }
            settings.scan_depth = depth;
            settings.save(settings_path)?;
        }
        SettingsAction::SetDefaultPath { path } => {
            let engine = ScanEngine::new(EngineConfig::default());
            engine
                .change_default_path(&mut settings, settings_path, &path.to_string_lossy())
                .await?;
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        println!("Settings file: {}", settings_path.display());
        println!("  scan depth:      {}", settings.effective_depth());
        println!("  include hidden:  {}", settings.include_hidden);
        println!("  extensions:      {}", settings.supported_extensions.join(" "));
        match &settings.default_scan_path {
            Some(path) => println!("  default path:    {}", path.display()),
            None => println!("  default path:    (not set)"),
        }
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
