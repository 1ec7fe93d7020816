//! # CLI Module
//!
//! Command-line interface for the duplicate image detector.
//!
//! ## Usage
//! ```bash
//! # Scan a directory for duplicates
//! image-dedup scan ~/Photos
//!
//! # Stricter matching with a larger fingerprint
//! image-dedup scan ~/Photos --hash-size 16 --threshold 24
//!
//! # Pick up an interrupted run
//! image-dedup scan ~/Photos --resume
//!
//! # JSON output
//! image-dedup scan ~/Photos --output json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use image_dedup::core::checkpoint::{CheckpointStore, SqliteStore};
use image_dedup::core::config::{recommended_threshold, DedupConfig};
use image_dedup::core::pipeline::{Pipeline, PipelineResult};
use image_dedup::error::{DedupError, Result};
use image_dedup::events::{CheckpointEvent, Event, EventChannel, ExtractEvent, PipelineEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

/// Image Dedup - Find duplicate images, rotated or not
#[derive(Parser, Debug)]
#[command(name = "image-dedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a directory for duplicate images
    Scan(ScanArgs),
}

#[derive(clap::Args, Debug)]
struct ScanArgs {
    /// Directory to scan
    path: PathBuf,

    /// Maximum Hamming distance for duplicates (lower = stricter)
    #[arg(short, long, default_value = "10")]
    threshold: u32,

    /// Fingerprint grid side: 8, 16 or 32
    #[arg(long, default_value_t = 8, value_parser = parse_hash_size)]
    hash_size: u32,

    /// Smallest accepted image side, in pixels
    #[arg(long, default_value = "100")]
    min_resolution: u32,

    /// Confirm matches with structural similarity (slower)
    #[arg(long)]
    ssim: bool,

    /// Minimum structural similarity for a confirmed match
    #[arg(long, default_value = "0.95")]
    ssim_threshold: f64,

    /// Checkpoint file (default: <DIR>/.dedup_checkpoint.json)
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Keep the checkpoint in this SQLite database instead of a JSON file
    #[arg(long, conflicts_with = "checkpoint")]
    checkpoint_db: Option<PathBuf>,

    /// Images processed between checkpoint saves
    #[arg(long, default_value = "100")]
    checkpoint_interval: usize,

    /// Resume from an existing checkpoint (Ctrl-C saves progress before exiting)
    #[arg(long)]
    resume: bool,

    /// Output format
    #[arg(short, long, default_value = "pretty")]
    output: OutputFormat,

    /// Include hidden files
    #[arg(long)]
    include_hidden: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (duplicate paths only)
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => {
            image_dedup::init_tracing(if args.verbose { "debug" } else { "warn" });
            run_scan(args)
        }
    }
}

fn run_scan(args: ScanArgs) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(args.output, OutputFormat::Pretty);
    let hash_size = args.hash_size;

    if pretty {
        term.write_line(&format!(
            "{} {}",
            style("Image Dedup").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        let default_threshold = DedupConfig::default().threshold;
        if hash_size > 8 && args.threshold == default_threshold {
            term.write_line(&format!(
                "  {} threshold {} is tuned for hash size 8; at {} the equivalent is {}",
                style("note:").yellow(),
                args.threshold,
                hash_size,
                recommended_threshold(args.threshold, hash_size)
            ))
            .ok();
        }
        term.write_line("").ok();
    }

    let mut builder = Pipeline::builder()
        .threshold(args.threshold)
        .hash_size(hash_size)
        .min_resolution(args.min_resolution)
        .structural_refinement(args.ssim)
        .structural_threshold(args.ssim_threshold)
        .checkpoint_interval(args.checkpoint_interval)
        .resume(args.resume)
        .include_hidden(args.include_hidden);

    if let Some(path) = args.checkpoint {
        builder = builder.checkpoint_path(path);
    }
    if let Some(db) = args.checkpoint_db {
        let root = std::fs::canonicalize(&args.path).unwrap_or_else(|_| args.path.clone());
        let store: Arc<dyn CheckpointStore> = Arc::new(SqliteStore::for_root(&db, &root)?);
        builder = builder.checkpoint_store(store);
    }

    let pipeline = builder.build()?;

    // First Ctrl-C stops extraction and flushes the checkpoint; a second one exits at once
    let token = pipeline.cancellation_token();
    if let Err(e) = ctrlc::set_handler(move || {
        if token.is_cancelled() {
            std::process::exit(130);
        }
        token.cancel();
    }) {
        tracing::warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let (sender, receiver) = EventChannel::new();

    let progress = if pretty {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let verbose = args.verbose;

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress_clone else {
                continue;
            };
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Extract(ExtractEvent::Started {
                    total_images,
                    already_processed,
                }) => {
                    pb.set_length(total_images as u64);
                    pb.set_position(already_processed as u64);
                }
                Event::Extract(ExtractEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                    if verbose {
                        pb.set_message(format!(
                            "{} ({} failed)",
                            p.current_path.file_name().unwrap_or_default().to_string_lossy(),
                            p.failures
                        ));
                    }
                }
                Event::Checkpoint(CheckpointEvent::Resumed { records, .. }) => {
                    pb.println(format!("  Resumed {} images from checkpoint", records));
                }
                Event::Checkpoint(CheckpointEvent::Rejected { reason, .. }) => {
                    pb.println(format!(
                        "  {} checkpoint ignored: {}",
                        style("warning:").yellow(),
                        reason
                    ));
                }
                Event::Pipeline(PipelineEvent::Completed { .. })
                | Event::Pipeline(PipelineEvent::Cancelled)
                | Event::Pipeline(PipelineEvent::Error { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = pipeline.run_with_events(&args.path, &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if matches!(result, Err(DedupError::Cancelled)) {
        term.write_line(&format!(
            "{} Interrupted; progress was saved. Run again with --resume to continue.",
            style("!").yellow().bold()
        ))
        .ok();
    }
    let result = result?;

    match args.output {
        OutputFormat::Pretty => print_pretty_results(&term, &result, args.verbose),
        OutputFormat::Json => print_json_results(&result),
        OutputFormat::Minimal => print_minimal_results(&result),
    }

    Ok(())
}

/// Accept only the grid sides the fingerprint engine supports
fn parse_hash_size(value: &str) -> std::result::Result<u32, String> {
    match value.parse::<u32>() {
        Ok(size @ (8 | 16 | 32)) => Ok(size),
        _ => Err(format!("'{}' is not a supported hash size (8, 16 or 32)", value)),
    }
}

fn print_pretty_results(term: &Term, result: &PipelineResult, verbose: bool) {
    let summary = &result.summary;

    term.write_line(&format!("{} Scan Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} images scanned in {:.1}s ({} extracted, {} resumed)",
        style(summary.total_images).cyan(),
        summary.duration_ms as f64 / 1000.0,
        summary.extracted,
        summary.resumed
    ))
    .ok();

    term.write_line(&format!(
        "  {} comparisons ({} without bucketing)",
        style(summary.comparisons).cyan(),
        summary.naive_comparisons
    ))
    .ok();

    term.write_line(&format!(
        "  {} duplicate groups, {} duplicate images",
        style(summary.duplicate_groups).cyan(),
        style(summary.duplicate_count).cyan()
    ))
    .ok();

    term.write_line(&format!(
        "  {} reclaimable",
        style(format_bytes(summary.reclaimable_bytes)).yellow()
    ))
    .ok();

    if summary.failures > 0 {
        term.write_line(&format!(
            "  {} images could not be read",
            style(summary.failures).red()
        ))
        .ok();
    }

    term.write_line("").ok();

    if result.groups.is_empty() {
        term.write_line(&format!("  {} No duplicates found!", style("✓").green()))
            .ok();
    } else {
        term.write_line(&format!("{}", style("Duplicate Groups:").bold().underlined()))
            .ok();
        term.write_line("").ok();

        for group in &result.groups {
            term.write_line(&format!(
                "  {} ({} images, avg distance {:.1}, {})",
                style(format!("Group {}:", group.group_id + 1)).bold(),
                group.len(),
                group.average_distance,
                format_bytes(group.reclaimable_bytes())
            ))
            .ok();

            for member in &group.members {
                let marker = if member.is_keeper {
                    style("★").green().to_string()
                } else {
                    style("○").dim().to_string()
                };

                let details = if verbose {
                    format!(
                        "  {} {} {} score {:.2}",
                        member.record.dimensions_display(),
                        member.record.format,
                        format_bytes(member.record.file_size),
                        member.quality_score
                    )
                } else {
                    String::new()
                };

                term.write_line(&format!(
                    "    {} {}{}",
                    marker,
                    member.record.path.display(),
                    style(details).dim()
                ))
                .ok();
            }

            term.write_line("").ok();
        }
    }

    if verbose && !result.failures.is_empty() {
        term.write_line(&format!("{}", style("Skipped Images:").bold().underlined()))
            .ok();
        for failure in &result.failures {
            term.write_line(&format!("  {} {}", style("✗").red(), failure.reason))
                .ok();
        }
        term.write_line("").ok();
    }

    term.write_line(&format!(
        "{}",
        style("Remember: No files were deleted. The starred (★) image is the recommended keeper.").dim()
    ))
    .ok();
}

fn print_json_results(result: &PipelineResult) {
    let output = serde_json::json!({
        "summary": result.summary,
        "bucket_stats": result.bucket_stats,
        "groups": result.groups.iter().map(|g| {
            serde_json::json!({
                "group_id": g.group_id,
                "average_distance": g.average_distance,
                "reclaimable_bytes": g.reclaimable_bytes(),
                "members": g.members.iter().map(|m| {
                    serde_json::json!({
                        "path": m.record.path,
                        "width": m.record.width,
                        "height": m.record.height,
                        "file_size": m.record.file_size,
                        "format": m.record.format,
                        "bit_depth": m.record.bit_depth,
                        "has_exif": m.record.has_exif,
                        "quality_score": m.quality_score,
                        "is_recommended_keeper": m.is_keeper,
                    })
                }).collect::<Vec<_>>(),
            })
        }).collect::<Vec<_>>(),
        "failures": result.failures,
    });

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to render JSON output: {}", e),
    }
}

fn print_minimal_results(result: &PipelineResult) {
    for group in &result.groups {
        for member in group.duplicates() {
            println!("{}", member.record.path.display());
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
