//! # depthslim
//!
//! Recompress phone photos that carry an embedded depth-effect payload —
//! detect the vendor marker, re-encode the pixels as a plain JPEG, and carry
//! the camera's EXIF metadata over to the slimmed copy.
//!
//! ## Quick Start
//!
//! The simplest way to use the library is through the pipeline module, which
//! handles the full detect → recompress → merge flow:
//!
//! ```rust,no_run
//! use depthslim::config::Config;
//! use depthslim::pipeline::{BatchSummary, collect_candidates, process_image};
//! use std::path::PathBuf;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!
//!     // Collect candidate JPEGs from paths (files or directories)
//!     let candidates = collect_candidates(
//!         &[PathBuf::from("./photos")],
//!         config.scan.min_size_bytes,
//!     );
//!
//!     let reports: Vec<_> = candidates
//!         .iter()
//!         .map(|c| process_image(&c.path, &config))
//!         .collect();
//!
//!     let summary = BatchSummary::from_reports(&reports);
//!     println!(
//!         "{} compressed, {} skipped, {} failed",
//!         summary.compressed + summary.compressed_bare,
//!         summary.not_marked,
//!         summary.failed,
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! For more control, call the detector, recompressor, and metadata handles
//! individually:
//!
//! ```rust,no_run
//! use depthslim::detect;
//! use depthslim::metadata::{JpegMetadataHandle, merge_and_verify};
//! use depthslim::recompress;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let source = Path::new("photo.jpg");
//!     let bytes = std::fs::read(source)?;
//!
//!     // 1. Check for the depth marker
//!     if !detect::detect(&bytes) {
//!         println!("no depth payload, nothing to do");
//!         return Ok(());
//!     }
//!
//!     // 2. Re-encode the pixels without the payload
//!     let image = recompress::decode(&bytes)?;
//!     let slim = recompress::recompress(&image, recompress::DEFAULT_QUALITY)?;
//!     let output = Path::new("photo_slim.jpg");
//!     std::fs::write(output, &slim)?;
//!
//!     // 3. Carry the EXIF fields over and verify the important ones
//!     let mut from = JpegMetadataHandle::open(source)?;
//!     let mut to = JpegMetadataHandle::open(output)?;
//!     let verification = merge_and_verify(&mut from, &mut to)?;
//!     println!(
//!         "{} fields copied, verified: {}",
//!         verification.fields_copied, verification.verified,
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`] — Configuration types and loading/saving
//! - [`detect`] — Depth-marker detection in XMP packets
//! - [`error`] — The crate's error type
//! - [`metadata`] — EXIF field allowlist, read/write handles, merge and verify
//! - [`pipeline`] — High-level processing pipeline and candidate collection
//! - [`recompress`] — JPEG decode and re-encode

pub mod config;
pub mod detect;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod recompress;

pub use error::{Error, Result};
