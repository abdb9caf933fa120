//! Quick EXIF summary via nom-exif.
//!
//! The merge path walks TIFF structures itself; this reader is the cheap
//! front door used for output naming and `--inspect`, where a missing or
//! unparsable EXIF block is ordinary and must not fail anything.

use std::path::Path;

use nom_exif::*;

use crate::error::{Error, Result};

/// The handful of fields worth surfacing without opening a full handle.
#[derive(Debug, Clone, Default)]
pub struct ExifSummary {
    /// DateTimeOriginal as the file spells it, e.g. `2024:01:01 10:00:00`.
    pub capture_timestamp: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
}

/// Read the summary fields from an image file. A file without EXIF yields an
/// empty summary; only failing to open the file at all is an error.
pub fn read_summary(path: &Path) -> Result<ExifSummary> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path)
        .map_err(|e| Error::metadata_read(path, e.to_string()))?;

    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(_) => {
            log::debug!("no EXIF data found in {}", path.display());
            return Ok(ExifSummary::default());
        }
    };
    let exif: Exif = iter.into();

    let mut summary = ExifSummary::default();
    if let Some(val) = exif.get(ExifTag::DateTimeOriginal) {
        summary.capture_timestamp = entry_to_string(val);
    }
    if let Some(val) = exif.get(ExifTag::Make) {
        summary.make = entry_to_string(val);
    }
    if let Some(val) = exif.get(ExifTag::Model) {
        summary.model = entry_to_string(val);
    }
    Ok(summary)
}

/// Convert an EntryValue to an Option<String>.
fn entry_to_string(val: &EntryValue) -> Option<String> {
    let s = val.to_string();
    let s = s.trim().trim_matches('"').to_string();
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_jpeg_gives_empty_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(8, 8));
        img.save(&path).unwrap();

        let summary = read_summary(&path).unwrap();
        assert!(summary.capture_timestamp.is_none());
        assert!(summary.make.is_none());
        assert!(summary.model.is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_summary(Path::new("/nonexistent/file.jpg")).is_err());
    }
}
