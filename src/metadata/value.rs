//! Canonical string form for EXIF values.
//!
//! Fields travel between files as strings: the reader decodes whatever the
//! source declares into a canonical text form, and the writer turns that text
//! back into raw value bytes using the field's registered kind. The encodings
//! are picked so decode-then-encode preserves the value exactly:
//!
//! * ASCII: UTF-8 text, trailing NULs stripped (re-added on encode)
//! * BYTE / SHORT / LONG and signed variants: comma-separated decimal
//! * RATIONAL / SRATIONAL: comma-separated `numerator/denominator`
//! * UNDEFINED: lowercase hex, two digits per byte

use little_exif::exif_tag_format::ExifTagFormat;

/// Value kind a field is written back as. Mirrors the TIFF field types we
/// actually copy; FLOAT and DOUBLE only ever appear on the read side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Ascii,
    Byte,
    Short,
    Long,
    Rational,
    SRational,
    Undefined,
}

impl TagKind {
    pub(crate) fn exif_format(self) -> ExifTagFormat {
        match self {
            TagKind::Ascii => ExifTagFormat::STRING,
            TagKind::Byte => ExifTagFormat::INT8U,
            TagKind::Short => ExifTagFormat::INT16U,
            TagKind::Long => ExifTagFormat::INT32U,
            TagKind::Rational => ExifTagFormat::RATIONAL64U,
            TagKind::SRational => ExifTagFormat::RATIONAL64S,
            TagKind::Undefined => ExifTagFormat::UNDEF,
        }
    }
}

/// Byte order declared by a TIFF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Callers pass exactly-sized slices (from `chunks_exact` or a prior
    /// bounds check).
    pub(crate) fn read_u16(self, b: &[u8]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes([b[0], b[1]]),
            ByteOrder::Big => u16::from_be_bytes([b[0], b[1]]),
        }
    }

    pub(crate) fn read_u32(self, b: &[u8]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            ByteOrder::Big => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        }
    }

    pub(crate) fn read_u64(self, b: &[u8]) -> u64 {
        match self {
            ByteOrder::Little => {
                u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            ByteOrder::Big => {
                u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
        }
    }
}

/// Size in bytes of one element of a TIFF field type, or `None` for types we
/// do not understand.
pub(crate) fn type_unit_size(field_type: u16) -> Option<usize> {
    match field_type {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

/// Decodes raw value bytes into the canonical string form, driven by the
/// field type the file declares. `data` must already be sliced to exactly
/// `count * unit` bytes.
pub(crate) fn decode_raw(field_type: u16, data: &[u8], order: ByteOrder) -> Option<String> {
    match field_type {
        1 => Some(join_list(data.iter().map(|b| b.to_string()))),
        2 => Some(decode_ascii(data)),
        3 => Some(join_list(
            data.chunks_exact(2).map(|c| order.read_u16(c).to_string()),
        )),
        4 => Some(join_list(
            data.chunks_exact(4).map(|c| order.read_u32(c).to_string()),
        )),
        5 => Some(join_list(data.chunks_exact(8).map(|c| {
            format!("{}/{}", order.read_u32(&c[..4]), order.read_u32(&c[4..]))
        }))),
        6 => Some(join_list(data.iter().map(|b| (*b as i8).to_string()))),
        7 => Some(hex_encode(data)),
        8 => Some(join_list(
            data.chunks_exact(2)
                .map(|c| (order.read_u16(c) as i16).to_string()),
        )),
        9 => Some(join_list(
            data.chunks_exact(4)
                .map(|c| (order.read_u32(c) as i32).to_string()),
        )),
        10 => Some(join_list(data.chunks_exact(8).map(|c| {
            format!(
                "{}/{}",
                order.read_u32(&c[..4]) as i32,
                order.read_u32(&c[4..]) as i32
            )
        }))),
        11 => Some(join_list(
            data.chunks_exact(4)
                .map(|c| f32::from_bits(order.read_u32(c)).to_string()),
        )),
        12 => Some(join_list(
            data.chunks_exact(8)
                .map(|c| f64::from_bits(order.read_u64(c)).to_string()),
        )),
        _ => None,
    }
}

/// Encodes a canonical string back into little-endian value bytes for the
/// given kind. Returns `None` when the string does not fit the kind.
pub(crate) fn encode_canonical(kind: TagKind, value: &str) -> Option<Vec<u8>> {
    match kind {
        TagKind::Ascii => {
            let mut out = value.as_bytes().to_vec();
            out.push(0);
            Some(out)
        }
        TagKind::Byte => collect_parts(value, |p| p.parse::<u8>().ok().map(|v| vec![v])),
        TagKind::Short => collect_parts(value, |p| {
            p.parse::<u16>().ok().map(|v| v.to_le_bytes().to_vec())
        }),
        TagKind::Long => collect_parts(value, |p| {
            p.parse::<u32>().ok().map(|v| v.to_le_bytes().to_vec())
        }),
        TagKind::Rational => collect_parts(value, encode_rational),
        TagKind::SRational => collect_parts(value, encode_srational),
        TagKind::Undefined => hex_decode(value),
    }
}

fn decode_ascii(data: &[u8]) -> String {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&data[..end]).into_owned()
}

fn join_list<I: Iterator<Item = String>>(items: I) -> String {
    items.collect::<Vec<_>>().join(",")
}

fn collect_parts(value: &str, encode_one: impl Fn(&str) -> Option<Vec<u8>>) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    for part in value.split(',') {
        out.extend(encode_one(part.trim())?);
    }
    Some(out)
}

fn encode_rational(part: &str) -> Option<Vec<u8>> {
    let (num, den) = part.split_once('/')?;
    let num: u32 = num.trim().parse().ok()?;
    let den: u32 = den.trim().parse().ok()?;
    let mut out = num.to_le_bytes().to_vec();
    out.extend_from_slice(&den.to_le_bytes());
    Some(out)
}

fn encode_srational(part: &str) -> Option<Vec<u8>> {
    let (num, den) = part.split_once('/')?;
    let num: i32 = num.trim().parse().ok()?;
    let den: i32 = den.trim().parse().ok()?;
    let mut out = num.to_le_bytes().to_vec();
    out.extend_from_slice(&den.to_le_bytes());
    Some(out)
}

fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if !s.is_ascii() || s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_strips_trailing_nuls() {
        assert_eq!(decode_raw(2, b"Xiaomi\0\0", ByteOrder::Little), Some("Xiaomi".into()));
        assert_eq!(decode_raw(2, b"\0\0", ByteOrder::Little), Some(String::new()));
    }

    #[test]
    fn ascii_encode_appends_nul() {
        assert_eq!(encode_canonical(TagKind::Ascii, "Xiaomi"), Some(b"Xiaomi\0".to_vec()));
    }

    #[test]
    fn shorts_respect_byte_order() {
        let raw = [0x01, 0x00, 0x2c, 0x01];
        assert_eq!(decode_raw(3, &raw, ByteOrder::Little), Some("1,300".into()));
        assert_eq!(decode_raw(3, &raw, ByteOrder::Big), Some("256,11265".into()));
    }

    #[test]
    fn rational_round_trips() {
        let raw = encode_canonical(TagKind::Rational, "179/100,1/3").unwrap();
        assert_eq!(decode_raw(5, &raw, ByteOrder::Little), Some("179/100,1/3".into()));
    }

    #[test]
    fn srational_handles_negatives() {
        let raw = encode_canonical(TagKind::SRational, "-4/3").unwrap();
        assert_eq!(decode_raw(10, &raw, ByteOrder::Little), Some("-4/3".into()));
    }

    #[test]
    fn undefined_is_hex() {
        let decoded = decode_raw(7, &[0x30, 0x32, 0x33, 0x32], ByteOrder::Little).unwrap();
        assert_eq!(decoded, "30323332");
        assert_eq!(
            encode_canonical(TagKind::Undefined, &decoded),
            Some(vec![0x30, 0x32, 0x33, 0x32])
        );
    }

    #[test]
    fn bad_values_refuse_to_encode() {
        assert_eq!(encode_canonical(TagKind::Short, "not-a-number"), None);
        assert_eq!(encode_canonical(TagKind::Short, "70000"), None);
        assert_eq!(encode_canonical(TagKind::Rational, "179"), None);
        assert_eq!(encode_canonical(TagKind::Undefined, "0x12"), None);
        assert_eq!(encode_canonical(TagKind::Undefined, "abc"), None);
    }

    #[test]
    fn unknown_field_type_is_skipped() {
        assert_eq!(decode_raw(13, &[0, 0, 0, 0], ByteOrder::Little), None);
        assert_eq!(type_unit_size(0), None);
        assert_eq!(type_unit_size(5), Some(8));
    }
}
