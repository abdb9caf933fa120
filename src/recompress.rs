//! Pixel recompression.
//!
//! The whole point of the pipeline: decode the marked photo and re-encode
//! just its pixels as a plain JPEG, which drops the depth payload and every
//! metadata segment. The EXIF merge puts the fields we keep back afterwards.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

use crate::error::{Error, Result};

/// Encode quality used when the configuration does not override it. High
/// enough that the visual delta is negligible; the size win comes from
/// dropping the depth payload, not from squeezing pixels.
pub const DEFAULT_QUALITY: u8 = 95;

/// Decodes image bytes into pixels. Truncated or non-image input is a
/// per-image fatal error.
pub fn decode(image_bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(image_bytes).map_err(Error::DecodeFailed)
}

/// Re-encodes pixels as a bare JPEG at `quality` (1-100). The output has no
/// metadata segments at all.
pub fn recompress(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    if quality == 0 || quality > 100 {
        return Err(Error::EncodeFailed(format!(
            "quality {quality} out of range (1-100)"
        )));
    }
    let rgb = image.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(Error::EncodeFailed("image has zero dimensions".into()));
    }
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder
        .write_image(&rgb, rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| Error::EncodeFailed(e.to_string()))?;
    Ok(out)
}
