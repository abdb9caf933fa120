//! Error types shared across the pipeline.
//!
//! Failures are split by the stage that produced them so callers can decide
//! how much of an image's processing survives: decode/encode errors abandon
//! the image, metadata errors leave a valid but bare output in place.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The source bytes could not be decoded into pixels.
    #[error("image decode failed: {0}")]
    DecodeFailed(image::ImageError),

    /// The decoded pixels could not be re-encoded as JPEG.
    #[error("jpeg encode failed: {0}")]
    EncodeFailed(String),

    /// Metadata could not be read or parsed from a file.
    #[error("could not read metadata from {}: {reason}", .path.display())]
    MetadataReadFailed { path: PathBuf, reason: String },

    /// Metadata could not be serialized or written back to a file.
    #[error("could not write metadata to {}: {reason}", .path.display())]
    MetadataWriteFailed { path: PathBuf, reason: String },
}

impl Error {
    pub(crate) fn metadata_read(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Error::MetadataReadFailed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn metadata_write(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Error::MetadataWriteFailed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
