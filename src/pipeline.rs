use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use walkdir::WalkDir;

use crate::config::Config;
use crate::detect;
use crate::metadata::{self, JpegMetadataHandle, VerificationResult, merge_and_verify};
use crate::recompress;

/// Candidate extensions. The depth marker only ever rides in JPEGs.
const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// One file the scan considers worth running through the pipeline.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Where in the per-image flow a fatal failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Decode,
    Encode,
    WriteOutput,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Read => "read",
            Stage::Decode => "decode",
            Stage::Encode => "encode",
            Stage::WriteOutput => "write-output",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sizes of one finished recompression.
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub original_path: PathBuf,
    pub output_path: PathBuf,
    pub original_size_bytes: u64,
    pub output_size_bytes: u64,
}

impl CompressionOutcome {
    /// Negative when the output grew; valid, just undesirable.
    pub fn saved_bytes(&self) -> i64 {
        self.original_size_bytes as i64 - self.output_size_bytes as i64
    }
}

/// How one image came out of the pipeline.
#[derive(Debug)]
pub enum ProcessStatus {
    /// No depth marker; the file was left alone.
    NotMarked,
    /// Recompressed, and the metadata merge went through. The verification
    /// outcome rides along; a mismatch there is a signal, not a failure.
    Compressed {
        outcome: CompressionOutcome,
        verification: VerificationResult,
    },
    /// Recompressed, but the metadata merge failed. The bare output is kept:
    /// a smaller file without EXIF beats no file at all.
    CompressedBare {
        outcome: CompressionOutcome,
        reason: String,
    },
    /// Nothing was produced for this image.
    Failed { stage: Stage, reason: String },
}

/// Per-image result handed back to the caller.
#[derive(Debug)]
pub struct ProcessReport {
    pub path: PathBuf,
    pub status: ProcessStatus,
}

/// Counts over a finished batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub compressed: usize,
    pub compressed_bare: usize,
    pub failed: usize,
    pub not_marked: usize,
    pub verification_mismatches: usize,
    pub saved_bytes: i64,
}

impl BatchSummary {
    pub fn from_reports(reports: &[ProcessReport]) -> Self {
        let mut summary = BatchSummary {
            total: reports.len(),
            ..BatchSummary::default()
        };
        for report in reports {
            match &report.status {
                ProcessStatus::NotMarked => summary.not_marked += 1,
                ProcessStatus::Compressed {
                    outcome,
                    verification,
                } => {
                    summary.compressed += 1;
                    summary.saved_bytes += outcome.saved_bytes();
                    if !verification.verified {
                        summary.verification_mismatches += 1;
                    }
                }
                ProcessStatus::CompressedBare { outcome, .. } => {
                    summary.compressed_bare += 1;
                    summary.saved_bytes += outcome.saved_bytes();
                }
                ProcessStatus::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }
}

/// Collect candidate JPEGs from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks). Files below `min_size_bytes` are
/// dropped without being opened: a photo small enough to sit under the
/// threshold cannot be carrying a depth payload worth stripping.
///
/// # Example
///
/// ```rust,no_run
/// use depthslim::pipeline::collect_candidates;
/// use std::path::PathBuf;
///
/// let candidates = collect_candidates(
///     &[PathBuf::from("photo.jpg"), PathBuf::from("./photos/")],
///     1024 * 1024,
/// );
/// println!("Found {} candidates", candidates.len());
/// ```
pub fn collect_candidates(paths: &[PathBuf], min_size_bytes: u64) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for path in paths {
        if path.is_file() {
            if !is_jpeg_file(path) {
                log::warn!("Skipping non-JPEG file: {}", path.display());
            } else if let Some(candidate) = candidate_for(path, min_size_bytes) {
                candidates.push(candidate);
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_jpeg_file(p) {
                    if let Some(candidate) = candidate_for(p, min_size_bytes) {
                        candidates.push(candidate);
                    }
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    candidates
}

fn is_jpeg_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| JPEG_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn candidate_for(path: &Path, min_size_bytes: u64) -> Option<Candidate> {
    let size_bytes = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            log::warn!("Cannot stat {}: {e}", path.display());
            return None;
        }
    };
    if size_bytes < min_size_bytes {
        log::debug!(
            "Skipping {} ({size_bytes} bytes, below minimum)",
            path.display()
        );
        return None;
    }
    Some(Candidate {
        path: path.to_path_buf(),
        size_bytes,
    })
}

/// Builds `{stem}_{suffix}_{timestamp}.jpg` for a source file, appending a
/// counter when that name is already taken. The source is never the result:
/// outputs are always new files.
///
/// The timestamp prefers the source's capture time, then the file's mtime,
/// then the current time.
pub fn output_path_for(
    source: &Path,
    suffix: &str,
    directory: Option<&Path>,
    capture_timestamp: Option<&str>,
) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let dir = match directory {
        Some(d) => d.to_path_buf(),
        None => source
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf(),
    };
    let stamp = name_timestamp(source, capture_timestamp)
        .format("%Y%m%d_%H%M%S")
        .to_string();

    let mut path = dir.join(format!("{stem}_{suffix}_{stamp}.jpg"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}_{suffix}_{stamp}_{n}.jpg"));
        n += 1;
    }
    path
}

fn name_timestamp(source: &Path, capture_timestamp: Option<&str>) -> NaiveDateTime {
    if let Some(parsed) = capture_timestamp.and_then(parse_exif_datetime) {
        return parsed;
    }
    if let Ok(meta) = std::fs::metadata(source) {
        if let Ok(mtime) = meta.modified() {
            let dt: DateTime<Local> = mtime.into();
            return dt.naive_local();
        }
    }
    Local::now().naive_local()
}

/// EXIF spells timestamps `2024:01:01 10:00:00`; tolerate the dashed and
/// zoned forms other writers (and nom-exif's display) emit.
fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    const PLAIN: &[&str] = &[
        "%Y:%m:%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];
    if let Some(dt) = PLAIN
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    const ZONED: &[&str] = &[
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y:%m:%d %H:%M:%S %z",
    ];
    ZONED
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok().map(|dt| dt.naive_local()))
}

/// Run one image through the full flow:
///
/// 1. **Detect** — look for the depth marker; unmarked files are left alone
/// 2. **Recompress** — decode and re-encode the pixels as a bare JPEG
/// 3. **Write** — persist the new bytes under a fresh name
/// 4. **Merge** — copy the allowlisted EXIF fields onto the output and verify
///
/// Failures stay local to the image: the report says what happened, the
/// function itself never returns an error, and a batch caller just moves on
/// to the next file. A failed merge demotes the result to
/// [`ProcessStatus::CompressedBare`] instead of discarding the output.
///
/// # Example
///
/// ```rust,no_run
/// use depthslim::config::Config;
/// use depthslim::pipeline::{ProcessStatus, process_image};
/// use std::path::Path;
///
/// let config = Config::default();
/// let report = process_image(Path::new("photo.jpg"), &config);
/// match report.status {
///     ProcessStatus::Compressed { outcome, .. } => {
///         println!("saved {} bytes", outcome.saved_bytes());
///     }
///     ProcessStatus::NotMarked => println!("no depth marker"),
///     _ => eprintln!("something went wrong"),
/// }
/// ```
pub fn process_image(path: &Path, config: &Config) -> ProcessReport {
    ProcessReport {
        path: path.to_path_buf(),
        status: process_inner(path, config),
    }
}

fn process_inner(path: &Path, config: &Config) -> ProcessStatus {
    let image_bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            return ProcessStatus::Failed {
                stage: Stage::Read,
                reason: e.to_string(),
            };
        }
    };

    if !detect::detect(&image_bytes) {
        log::debug!("{}: no depth marker", path.display());
        return ProcessStatus::NotMarked;
    }

    let image = match recompress::decode(&image_bytes) {
        Ok(image) => image,
        Err(e) => {
            return ProcessStatus::Failed {
                stage: Stage::Decode,
                reason: e.to_string(),
            };
        }
    };
    let jpeg_bytes = match recompress::recompress(&image, config.recompression.quality) {
        Ok(bytes) => bytes,
        Err(e) => {
            return ProcessStatus::Failed {
                stage: Stage::Encode,
                reason: e.to_string(),
            };
        }
    };

    // Output naming wants the capture time; a file we cannot summarize
    // still gets a name from its mtime.
    let summary = match metadata::read_summary(path) {
        Ok(summary) => summary,
        Err(e) => {
            log::debug!("{}: {e}", path.display());
            metadata::ExifSummary::default()
        }
    };
    let output_path = output_path_for(
        path,
        &config.output.suffix,
        config.output.directory.as_deref(),
        summary.capture_timestamp.as_deref(),
    );

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return ProcessStatus::Failed {
                    stage: Stage::WriteOutput,
                    reason: e.to_string(),
                };
            }
        }
    }
    if let Err(e) = std::fs::write(&output_path, &jpeg_bytes) {
        return ProcessStatus::Failed {
            stage: Stage::WriteOutput,
            reason: e.to_string(),
        };
    }
    log::info!("{} -> {}", path.display(), output_path.display());

    let original_size_bytes = image_bytes.len() as u64;
    match merge_metadata(path, &output_path) {
        Ok(verification) => ProcessStatus::Compressed {
            outcome: measure(path, &output_path, original_size_bytes, &jpeg_bytes),
            verification,
        },
        Err(e) => {
            log::warn!(
                "{}: metadata merge failed, keeping bare output: {e}",
                output_path.display()
            );
            demote_to_bare(path, &output_path, original_size_bytes, &jpeg_bytes, &e)
        }
    }
}

/// The degraded-success arm. The merge's commit rewrites the output file in
/// place, so a commit that died mid-write (disk full, say) leaves a
/// truncated merge on disk rather than the recompressed JPEG; put the
/// recompressed bytes back before reporting the output as kept. When even
/// that write fails there is no output worth reporting, and the image fails
/// at the write stage.
fn demote_to_bare(
    source: &Path,
    output_path: &Path,
    original_size_bytes: u64,
    jpeg_bytes: &[u8],
    merge_err: &crate::error::Error,
) -> ProcessStatus {
    if let Err(io_err) = ensure_output_bytes(output_path, jpeg_bytes) {
        return ProcessStatus::Failed {
            stage: Stage::WriteOutput,
            reason: format!(
                "metadata merge failed ({merge_err}); rewriting the bare output failed: {io_err}"
            ),
        };
    }
    ProcessStatus::CompressedBare {
        outcome: measure(source, output_path, original_size_bytes, jpeg_bytes),
        reason: merge_err.to_string(),
    }
}

/// Rewrites `path` to hold exactly `bytes`, skipping the write when it
/// already does.
fn ensure_output_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    match std::fs::read(path) {
        Ok(on_disk) if on_disk == bytes => Ok(()),
        _ => std::fs::write(path, bytes),
    }
}

fn merge_metadata(source: &Path, output: &Path) -> crate::error::Result<VerificationResult> {
    let mut source = JpegMetadataHandle::open(source)?;
    let mut output = JpegMetadataHandle::open(output)?;
    merge_and_verify(&mut source, &mut output)
}

fn measure(
    source: &Path,
    output: &Path,
    original_size_bytes: u64,
    written: &[u8],
) -> CompressionOutcome {
    // The merge may have grown the file after the initial write; prefer the
    // size on disk.
    let output_size_bytes = std::fs::metadata(output)
        .map(|m| m.len())
        .unwrap_or(written.len() as u64);
    CompressionOutcome {
        original_path: source.to_path_buf(),
        output_path: output.to_path_buf(),
        original_size_bytes,
        output_size_bytes,
    }
}
