use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use depthslim::metadata::MetadataHandle;
use depthslim::{config, detect, metadata, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "depthslim",
    version,
    about = "Recompress depth-effect phone photos — strip the embedded depth payload and carry the EXIF metadata over"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Scan for the depth marker without writing any files
    #[arg(long)]
    dry_run: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Display the depth marker and EXIF summary for each image and exit
    #[arg(long)]
    inspect: bool,

    /// Override the JPEG re-encode quality (1-100)
    #[arg(short, long, value_name = "N")]
    quality: Option<u8>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    // Validate inputs for non-init commands
    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }
    if cli.paths.iter().all(|p| !p.exists()) {
        anyhow::bail!("None of the specified paths exist; cannot scan for images.");
    }

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(quality) = cli.quality {
        if !(1..=100).contains(&quality) {
            anyhow::bail!("--quality must be between 1 and 100, got {quality}");
        }
        config.recompression.quality = quality;
    }

    // Collect candidates. An empty scan is a normal outcome, not an error:
    // a directory with no JPEGs above the size threshold simply has nothing
    // for us to do.
    let candidates = pipeline::collect_candidates(&cli.paths, config.scan.min_size_bytes);
    if candidates.is_empty() {
        log::info!("No JPEG candidates found in the specified paths.");
        return Ok(());
    }

    // Handle --inspect
    if cli.inspect {
        for candidate in &candidates {
            print_inspection(&candidate.path);
        }
        return Ok(());
    }

    // Handle --dry-run
    if cli.dry_run {
        return scan_only(&candidates, cli.json);
    }

    log::info!("Found {} candidate(s) to process", candidates.len());

    // Process each image
    let mut reports = Vec::new();
    let total = candidates.len();

    for (i, candidate) in candidates.iter().enumerate() {
        log::info!(
            "[{}/{}] Processing: {}",
            i + 1,
            total,
            candidate.path.display()
        );

        let report = pipeline::process_image(&candidate.path, &config);

        match &report.status {
            pipeline::ProcessStatus::NotMarked => {
                log::info!("  No depth marker, skipped");
            }
            pipeline::ProcessStatus::Compressed {
                outcome,
                verification,
            } => {
                log::info!(
                    "  {} -> {} ({})",
                    format_bytes(outcome.original_size_bytes as i64),
                    format_bytes(outcome.output_size_bytes as i64),
                    format_saved(outcome.saved_bytes()),
                );
                log::info!("  Copied {} EXIF field(s)", verification.fields_copied);
                for mismatch in verification.mismatches() {
                    log::warn!(
                        "  Verification mismatch on {}: source {:?}, output {:?}",
                        mismatch.field,
                        mismatch.source,
                        mismatch.target,
                    );
                }
            }
            pipeline::ProcessStatus::CompressedBare { outcome, reason } => {
                log::warn!("  Metadata merge failed: {reason}");
                log::warn!(
                    "  Kept bare output: {} ({})",
                    outcome.output_path.display(),
                    format_saved(outcome.saved_bytes()),
                );
            }
            pipeline::ProcessStatus::Failed { stage, reason } => {
                log::error!("  Failed at {stage}: {reason}");
            }
        }

        reports.push(report);
    }

    // JSON output
    if cli.json {
        let json_reports: Vec<serde_json::Value> =
            reports.iter().map(report_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&json_reports)?);
    }

    // Summary
    let summary = pipeline::BatchSummary::from_reports(&reports);
    log::info!(
        "Done: {} compressed ({} without metadata), {} unmarked, {} failed out of {} candidates",
        summary.compressed + summary.compressed_bare,
        summary.compressed_bare,
        summary.not_marked,
        summary.failed,
        summary.total,
    );
    if summary.compressed + summary.compressed_bare > 0 {
        log::info!("Total space saved: {}", format_bytes(summary.saved_bytes));
    }
    if summary.verification_mismatches > 0 {
        log::warn!(
            "{} image(s) finished with a verification mismatch — outputs were kept, check the log above",
            summary.verification_mismatches
        );
    }

    Ok(())
}

/// Detection-only pass: report which candidates carry the depth marker
/// without decoding or writing anything.
fn scan_only(candidates: &[pipeline::Candidate], json: bool) -> Result<()> {
    let mut rows = Vec::new();
    let mut marked = 0usize;

    for candidate in candidates {
        let is_marked = match std::fs::read(&candidate.path) {
            Ok(bytes) => detect::detect(&bytes),
            Err(e) => {
                log::warn!("Cannot read {}: {e}", candidate.path.display());
                false
            }
        };
        if is_marked {
            marked += 1;
            log::info!("[match] {}", candidate.path.display());
        } else {
            log::debug!("[ -- ] {}", candidate.path.display());
        }
        rows.push(serde_json::json!({
            "path": candidate.path.display().to_string(),
            "size_bytes": candidate.size_bytes,
            "marked": is_marked,
        }));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }
    log::info!(
        "{marked} of {} candidate(s) carry the depth marker; nothing written",
        candidates.len()
    );
    Ok(())
}

fn report_to_json(report: &pipeline::ProcessReport) -> serde_json::Value {
    let path = report.path.display().to_string();
    match &report.status {
        pipeline::ProcessStatus::NotMarked => serde_json::json!({
            "path": path,
            "status": "not-marked",
        }),
        pipeline::ProcessStatus::Compressed {
            outcome,
            verification,
        } => serde_json::json!({
            "path": path,
            "status": "compressed",
            "output_path": outcome.output_path.display().to_string(),
            "original_size_bytes": outcome.original_size_bytes,
            "output_size_bytes": outcome.output_size_bytes,
            "saved_bytes": outcome.saved_bytes(),
            "fields_copied": verification.fields_copied,
            "verified": verification.verified,
            "mismatches": verification
                .mismatches()
                .map(|c| serde_json::json!({
                    "field": c.field,
                    "source": c.source,
                    "output": c.target,
                }))
                .collect::<Vec<_>>(),
        }),
        pipeline::ProcessStatus::CompressedBare { outcome, reason } => serde_json::json!({
            "path": path,
            "status": "compressed-bare",
            "output_path": outcome.output_path.display().to_string(),
            "original_size_bytes": outcome.original_size_bytes,
            "output_size_bytes": outcome.output_size_bytes,
            "saved_bytes": outcome.saved_bytes(),
            "reason": reason,
        }),
        pipeline::ProcessStatus::Failed { stage, reason } => serde_json::json!({
            "path": path,
            "status": "failed",
            "stage": stage.as_str(),
            "reason": reason,
        }),
    }
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print the depth marker state and EXIF summary for one file.
fn print_inspection(path: &std::path::Path) {
    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            println!("  {DIM}(cannot read: {e}){RESET}");
            println!();
            return;
        }
    };

    println!("  {BOLD}Depth Marker{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
    match detect::marker_property_value(&bytes) {
        Some(value) => {
            print_row(detect::VENDOR_XMP_PROPERTY, &value);
            let verdict = if detect::detect(&bytes) {
                "yes"
            } else {
                "no (marker present, no depthmap token)"
            };
            print_row("Depth payload", verdict);
        }
        None => print_row("Depth payload", "no"),
    }
    println!();

    println!("  {BOLD}EXIF Summary{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
    match metadata::read_summary(path) {
        Ok(summary) => {
            let rows = [
                ("DateTimeOriginal", summary.capture_timestamp),
                ("Make", summary.make),
                ("Model", summary.model),
            ];
            let mut any = false;
            for (tag, value) in rows {
                if let Some(value) = value {
                    print_row(tag, &value);
                    any = true;
                }
            }
            if !any {
                println!("  {DIM}(no EXIF metadata found){RESET}");
            }
        }
        Err(e) => println!("  {DIM}(metadata unreadable: {e}){RESET}"),
    }

    match metadata::JpegMetadataHandle::open(path) {
        Ok(handle) => {
            let present = metadata::allowlist::COPIED_FIELDS
                .iter()
                .filter(|field| handle.get_field(field).is_some())
                .count();
            print_row("Allowlisted fields", &present.to_string());
        }
        Err(e) => log::debug!("{}: {e}", path.display()),
    }
    println!();
}

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print a single row in the inspection table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}

/// `1462 B`, `1.4 KiB`, `2.3 MiB`; negative when an output grew.
fn format_bytes(bytes: i64) -> String {
    let sign = if bytes < 0 { "-" } else { "" };
    let abs = bytes.unsigned_abs();
    if abs < 1024 {
        format!("{sign}{abs} B")
    } else if abs < 1024 * 1024 {
        format!("{sign}{:.1} KiB", abs as f64 / 1024.0)
    } else {
        format!("{sign}{:.1} MiB", abs as f64 / (1024.0 * 1024.0))
    }
}

fn format_saved(saved: i64) -> String {
    if saved >= 0 {
        format!("saved {}", format_bytes(saved))
    } else {
        format!("grew by {}", format_bytes(-saved))
    }
}
