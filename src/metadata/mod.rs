//! EXIF field transfer between source and recompressed output.
//!
//! The pieces, bottom up:
//!
//! - [`allowlist`]: the registry of fields we copy, with tag id, IFD and kind
//! - [`TagKind`]: the canonical string form every value travels in
//! - [`MetadataHandle`] / [`JpegMetadataHandle`]: staged per-file access
//! - [`merge_and_verify`]: copy everything present, commit once, re-read
//!   and compare the verified fields
//! - [`read_summary`]: cheap nom-exif summary for naming and inspection

pub mod allowlist;
mod handle;
mod merge;
mod reader;
mod value;

pub use allowlist::{TagField, TagGroup};
pub use handle::{JpegMetadataHandle, MetadataHandle};
pub use merge::{FieldComparison, VerificationResult, merge_and_verify};
pub use reader::{ExifSummary, read_summary};
pub use value::TagKind;
