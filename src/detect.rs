//! Depth-effect marker detection.
//!
//! Photos shot in portrait/depth mode carry an XMP packet whose
//! `MiCamera:XMPMeta` property embeds the vendor's capture description; when
//! that description mentions a depth map, the file also carries the extra
//! payload we want to strip by recompressing. Detection never fails: any
//! unparsable input simply does not match.

use img_parts::Bytes;
use img_parts::jpeg::Jpeg;

/// XMP property the vendor stores its capture description in.
pub const VENDOR_XMP_PROPERTY: &str = "MiCamera:XMPMeta";

/// Substring (case-insensitive) of the property value that marks a
/// depth-effect photo.
pub const DEPTH_MARKER_TOKEN: &str = "depthmap";

const APP1_MARKER: u8 = 0xE1;
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMP_EXTENSION_HEADER: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
// Each extension chunk starts with a 32-byte GUID, a 4-byte full-packet
// length and a 4-byte chunk offset before the packet bytes.
const XMP_EXTENSION_PRELUDE: usize = 40;

/// Does this image carry the depth-effect marker?
pub fn detect(image_bytes: &[u8]) -> bool {
    match marker_property_value(image_bytes) {
        Some(value) => value.to_ascii_lowercase().contains(DEPTH_MARKER_TOKEN),
        None => false,
    }
}

/// Raw value of [`VENDOR_XMP_PROPERTY`], if the image has one. Standard XMP
/// wins over the extended packet when the property appears in both.
pub fn marker_property_value(image_bytes: &[u8]) -> Option<String> {
    let jpeg = match Jpeg::from_bytes(Bytes::copy_from_slice(image_bytes)) {
        Ok(jpeg) => jpeg,
        Err(e) => {
            log::debug!("not a parsable JPEG: {e}");
            return None;
        }
    };
    let (standard, extended) = xmp_packets(&jpeg);
    standard
        .as_deref()
        .and_then(find_property)
        .or_else(|| extended.as_deref().and_then(find_property))
}

/// Collects the standard XMP packet and the reassembled extended packet.
/// Extension chunks are concatenated in file order after their per-chunk
/// prelude is dropped.
fn xmp_packets(jpeg: &Jpeg) -> (Option<String>, Option<String>) {
    let mut standard = None;
    let mut extended = Vec::new();
    for segment in jpeg.segments() {
        if segment.marker() != APP1_MARKER {
            continue;
        }
        let contents = segment.contents();
        if contents.starts_with(XMP_HEADER) {
            if standard.is_none() {
                standard =
                    Some(String::from_utf8_lossy(&contents[XMP_HEADER.len()..]).into_owned());
            }
        } else if contents.starts_with(XMP_EXTENSION_HEADER) {
            let body = &contents[XMP_EXTENSION_HEADER.len()..];
            if body.len() > XMP_EXTENSION_PRELUDE {
                extended.extend_from_slice(&body[XMP_EXTENSION_PRELUDE..]);
            }
        }
    }
    let extended = if extended.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&extended).into_owned())
    };
    (standard, extended)
}

/// Finds the property in a serialized XMP packet. Handles both spellings the
/// vendor uses: attribute form (`MiCamera:XMPMeta="..."`) and element form
/// (`<MiCamera:XMPMeta>...</MiCamera:XMPMeta>`).
fn find_property(xmp: &str) -> Option<String> {
    for (at, _) in xmp.match_indices(VENDOR_XMP_PROPERTY) {
        let rest = xmp[at + VENDOR_XMP_PROPERTY.len()..].trim_start();
        if let Some(value) = parse_attribute_value(rest).or_else(|| parse_element_value(rest)) {
            return Some(value);
        }
    }
    None
}

fn parse_attribute_value(rest: &str) -> Option<String> {
    let tail = rest.strip_prefix('=')?.trim_start();
    let quote = tail.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let inner = &tail[1..];
    let end = inner.find(quote)?;
    Some(xml_unescape(&inner[..end]))
}

fn parse_element_value(rest: &str) -> Option<String> {
    let tail = rest.strip_prefix('>')?;
    let close = format!("</{VENDOR_XMP_PROPERTY}>");
    let end = tail.find(&close)?;
    Some(xml_unescape(tail[..end].trim()))
}

/// Inverse of the escaping XMP writers apply to attribute values. `&amp;`
/// goes last so doubly-escaped entities survive one level.
fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
