//! File-backed metadata handles.
//!
//! A handle wraps one JPEG on disk and exposes its copyable fields through
//! [`MetadataHandle`]. Reads go through our own bounds-checked TIFF walk so a
//! hostile or truncated EXIF blob can only ever produce an error, never a
//! panic. Writes go the other way: staged fields are serialized with
//! little_exif and spliced back into the file with img-parts, leaving every
//! other segment untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use little_exif::endian::Endian;
use little_exif::exif_tag::{ExifTag, ExifTagGroup};
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;

use super::allowlist::{TagField, TagGroup};
use super::value::{self, ByteOrder};
use crate::error::{Error, Result};

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

const APP1_MARKER: u8 = 0xE1;

/// Staged read/write access to one file's copyable metadata fields.
///
/// `set_field` only stages; nothing reaches the file until `commit`. Reads
/// reflect the file as of the last open or [`reload`](Self::reload), not
/// staged writes.
pub trait MetadataHandle {
    /// Canonical string value of `field`, or `None` when the file does not
    /// carry it.
    fn get_field(&self, field: &TagField) -> Option<String>;

    /// Stages `value` for `field`. The value is validated against the
    /// field's kind here, so a bad value fails before anything is written.
    fn set_field(&mut self, field: &TagField, value: &str) -> Result<()>;

    /// Writes all staged fields to the file in a single pass.
    fn commit(&mut self) -> Result<()>;

    /// Re-reads the file, replacing the cached view. Staged fields survive.
    fn reload(&mut self) -> Result<()>;
}

/// [`MetadataHandle`] over a JPEG file on disk.
pub struct JpegMetadataHandle {
    path: PathBuf,
    fields: HashMap<(TagGroup, u16), String>,
    pending: Vec<(TagField, Vec<u8>)>,
}

impl JpegMetadataHandle {
    /// Opens `path` and parses its EXIF segment. A file without EXIF opens
    /// fine (all reads return `None`); a file whose EXIF cannot be parsed is
    /// an error.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(JpegMetadataHandle {
            path: path.to_path_buf(),
            fields: read_fields(path)?,
            pending: Vec::new(),
        })
    }
}

impl MetadataHandle for JpegMetadataHandle {
    fn get_field(&self, field: &TagField) -> Option<String> {
        self.fields.get(&(field.group, field.tag_id)).cloned()
    }

    fn set_field(&mut self, field: &TagField, value: &str) -> Result<()> {
        let raw = value::encode_canonical(field.kind, value).ok_or_else(|| {
            Error::metadata_write(
                &self.path,
                format!("value {value:?} does not fit {} ({:?})", field.name, field.kind),
            )
        })?;
        self.pending
            .retain(|(f, _)| (f.group, f.tag_id) != (field.group, field.tag_id));
        self.pending.push((*field, raw));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let file_bytes = std::fs::read(&self.path)
            .map_err(|e| Error::metadata_write(&self.path, e.to_string()))?;
        let mut jpeg = Jpeg::from_bytes(Bytes::from(file_bytes))
            .map_err(|e| Error::metadata_write(&self.path, e.to_string()))?;

        // Remember where the EXIF segment was originally positioned
        let original_exif_pos = find_exif_segment_pos(&jpeg);

        let mut metadata = load_existing_metadata(&self.path).unwrap_or_else(Metadata::new);
        for (field, raw) in &self.pending {
            let Ok(tag) = ExifTag::from_u16_with_data(
                field.tag_id,
                &field.kind.exif_format(),
                raw,
                &Endian::Little,
                &exif_group(field.group),
            ) else {
                return Err(Error::metadata_write(
                    &self.path,
                    format!("{} rejected by the EXIF encoder", field.name),
                ));
            };
            metadata.set_tag(tag);
        }

        let exif_bytes = metadata.as_u8_vec(FileExtension::JPEG);
        if exif_bytes.len() <= JPEG_EXIF_OVERHEAD {
            return Err(Error::metadata_write(&self.path, "serialized EXIF came out empty"));
        }
        jpeg.set_exif(Some(Bytes::from(exif_bytes[JPEG_EXIF_OVERHEAD..].to_vec())));
        restore_exif_position(&mut jpeg, original_exif_pos);

        let output = jpeg.encoder().bytes();
        std::fs::write(&self.path, &output)
            .map_err(|e| Error::metadata_write(&self.path, e.to_string()))?;
        self.pending.clear();
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.fields = read_fields(&self.path)?;
        Ok(())
    }
}

fn exif_group(group: TagGroup) -> ExifTagGroup {
    match group {
        TagGroup::Ifd0 => ExifTagGroup::IFD0,
        TagGroup::ExifIfd => ExifTagGroup::ExifIFD,
        TagGroup::GpsIfd => ExifTagGroup::GPSIFD,
    }
}

fn read_fields(path: &Path) -> Result<HashMap<(TagGroup, u16), String>> {
    let bytes = std::fs::read(path).map_err(|e| Error::metadata_read(path, e.to_string()))?;
    let jpeg = Jpeg::from_bytes(Bytes::from(bytes))
        .map_err(|e| Error::metadata_read(path, e.to_string()))?;
    match jpeg.exif() {
        None => Ok(HashMap::new()),
        Some(tiff) => parse_tiff_fields(&tiff)
            .ok_or_else(|| Error::metadata_read(path, "corrupt TIFF structure in EXIF segment")),
    }
}

/// Walks IFD0 and its Exif/GPS sub-IFDs, decoding every entry into canonical
/// string form. Returns `None` when the root structure is unreadable;
/// individual malformed entries are skipped instead.
fn parse_tiff_fields(tiff: &[u8]) -> Option<HashMap<(TagGroup, u16), String>> {
    const TAG_EXIF_IFD_POINTER: u16 = 0x8769;
    const TAG_GPS_IFD_POINTER: u16 = 0x8825;

    let (order, ifd0_offset) = read_tiff_header(tiff)?;
    let mut fields = HashMap::new();
    let mut exif_ifd_offset = None;
    let mut gps_ifd_offset = None;

    for entry in read_ifd_entries(tiff, order, ifd0_offset)? {
        match entry.tag {
            TAG_EXIF_IFD_POINTER => exif_ifd_offset = Some(entry.value_offset),
            TAG_GPS_IFD_POINTER => gps_ifd_offset = Some(entry.value_offset),
            _ => stash_entry(tiff, order, TagGroup::Ifd0, &entry, &mut fields),
        }
    }
    // A broken sub-IFD pointer loses that sub-IFD, not the whole file.
    if let Some(offset) = exif_ifd_offset {
        for entry in read_ifd_entries(tiff, order, offset).unwrap_or_default() {
            stash_entry(tiff, order, TagGroup::ExifIfd, &entry, &mut fields);
        }
    }
    if let Some(offset) = gps_ifd_offset {
        for entry in read_ifd_entries(tiff, order, offset).unwrap_or_default() {
            stash_entry(tiff, order, TagGroup::GpsIfd, &entry, &mut fields);
        }
    }
    Some(fields)
}

fn read_tiff_header(tiff: &[u8]) -> Option<(ByteOrder, u32)> {
    let order = match tiff.get(..2)? {
        b"II" => ByteOrder::Little,
        b"MM" => ByteOrder::Big,
        _ => return None,
    };
    if order.read_u16(tiff.get(2..4)?) != 42 {
        return None;
    }
    Some((order, order.read_u32(tiff.get(4..8)?)))
}

/// One 12-byte IFD entry, as laid out in the file.
struct IfdEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Offset of the value when it does not fit inline.
    value_offset: u32,
    /// Byte position of the entry itself within the TIFF blob.
    entry_offset: usize,
}

fn read_ifd_entries(tiff: &[u8], order: ByteOrder, ifd_offset: u32) -> Option<Vec<IfdEntry>> {
    let base = ifd_offset as usize;
    let entry_count = order.read_u16(tiff.get(base..base + 2)?) as usize;
    let mut entries = Vec::with_capacity(entry_count.min(512));
    for i in 0..entry_count {
        let entry_offset = base + 2 + i * 12;
        let raw = tiff.get(entry_offset..entry_offset + 12)?;
        entries.push(IfdEntry {
            tag: order.read_u16(&raw[0..2]),
            field_type: order.read_u16(&raw[2..4]),
            count: order.read_u32(&raw[4..8]),
            value_offset: order.read_u32(&raw[8..12]),
            entry_offset,
        });
    }
    Some(entries)
}

fn stash_entry(
    tiff: &[u8],
    order: ByteOrder,
    group: TagGroup,
    entry: &IfdEntry,
    fields: &mut HashMap<(TagGroup, u16), String>,
) {
    let Some(raw) = entry_value_bytes(tiff, entry) else {
        log::debug!("skipping unreadable tag {:#06x} in {group:?}", entry.tag);
        return;
    };
    if let Some(decoded) = value::decode_raw(entry.field_type, raw, order) {
        fields.insert((group, entry.tag), decoded);
    }
}

fn entry_value_bytes<'a>(tiff: &'a [u8], entry: &IfdEntry) -> Option<&'a [u8]> {
    let unit = value::type_unit_size(entry.field_type)?;
    let total = unit.checked_mul(entry.count as usize)?;
    if total <= 4 {
        // Inline values live in the last four bytes of the entry, in file order.
        tiff.get(entry.entry_offset + 8..entry.entry_offset + 8 + total)
    } else {
        let start = entry.value_offset as usize;
        tiff.get(start..start.checked_add(total)?)
    }
}

/// Load existing EXIF metadata from a file path using little_exif.
/// Returns None if it can't parse (instead of losing the write).
fn load_existing_metadata(path: &Path) -> Option<Metadata> {
    let path_owned = path.to_path_buf();
    // Suppress panics from little_exif
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let result = std::panic::catch_unwind(move || Metadata::new_from_path(&path_owned));
    std::panic::set_hook(prev_hook);

    match result {
        Ok(Ok(m)) => {
            if m.data().is_empty() {
                log::debug!("little_exif loaded empty metadata");
                None
            } else {
                log::debug!("little_exif loaded {} existing EXIF tags", m.data().len());
                Some(m)
            }
        }
        Ok(Err(e)) => {
            log::debug!("little_exif could not parse EXIF: {e}");
            None
        }
        Err(_) => {
            log::debug!("little_exif panicked parsing EXIF");
            None
        }
    }
}

/// Find the position of the EXIF APP1 segment in a JPEG.
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    const EXIF_PREFIX: &[u8] = b"Exif\0\0";
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == APP1_MARKER && s.contents().starts_with(EXIF_PREFIX))
}

/// set_exif() inserts at position 3, which may be after other APP1 segments.
/// Move the EXIF segment back to where the file had it (or right after APP0
/// for files that had none) so EXIF stays first for strict parsers.
fn restore_exif_position(jpeg: &mut Jpeg, original_pos: Option<usize>) {
    let Some(new_pos) = find_exif_segment_pos(jpeg) else {
        return;
    };
    let target_pos = original_pos.unwrap_or(1);
    if new_pos != target_pos && target_pos < new_pos {
        let segments = jpeg.segments_mut();
        let seg = segments.remove(new_pos);
        segments.insert(target_pos, seg);
    }
}

#[cfg(test)]
mod tests {
    use super::super::allowlist::{DATE_TIME_ORIGINAL, MAKE, MODEL, field_by_name};
    use super::*;

    // Builds a little-endian TIFF blob: IFD0 with Make plus pointers to an
    // Exif IFD (DateTimeOriginal, FNumber) and a GPS IFD (GPSLatitudeRef).
    fn sample_tiff() -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II");
        tiff.extend_from_slice(&42u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes()); // IFD0 at byte 8

        // IFD0: 3 entries, starts at 8; next offsets computed below.
        // Layout: [8: count][10..46: entries][46: next=0][50+: payloads]
        let exif_ifd: u32 = 90;
        let gps_ifd: u32 = 140;
        let make_off: u32 = 50;

        tiff.extend_from_slice(&3u16.to_le_bytes());
        put_entry(&mut tiff, 0x010F, 2, 7, make_off); // Make, "Xiaomi\0"
        put_entry(&mut tiff, 0x8769, 4, 1, exif_ifd);
        put_entry(&mut tiff, 0x8825, 4, 1, gps_ifd);
        tiff.extend_from_slice(&0u32.to_le_bytes());

        assert_eq!(tiff.len(), 50);
        tiff.extend_from_slice(b"Xiaomi\0");
        tiff.resize(90, 0);

        // Exif IFD at 90: 2 entries
        let dto_off: u32 = 120;
        tiff.extend_from_slice(&2u16.to_le_bytes());
        put_entry(&mut tiff, 0x9003, 2, 20, dto_off); // DateTimeOriginal
        put_entry(&mut tiff, 0x829D, 5, 1, 0); // FNumber, patched below
        tiff.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(tiff.len(), 120);
        tiff.extend_from_slice(b"2024:01:01 10:00:00\0");
        assert_eq!(tiff.len(), 140);

        // FNumber rational payload has to live somewhere; reuse offset 160.
        let fnum_off: u32 = 160;
        let fnum_entry = 90 + 2 + 12; // second entry of the Exif IFD
        tiff[fnum_entry + 8..fnum_entry + 12].copy_from_slice(&fnum_off.to_le_bytes());

        // GPS IFD at 140: 1 entry, inline ASCII "N\0"
        tiff.extend_from_slice(&1u16.to_le_bytes());
        put_entry(&mut tiff, 0x0001, 2, 2, 0);
        // inline: overwrite the value bytes we just wrote
        let gps_entry = 142;
        tiff[gps_entry + 8] = b'N';
        tiff[gps_entry + 9] = 0;
        tiff.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(tiff.len(), 158);

        tiff.resize(160, 0);
        tiff.extend_from_slice(&179u32.to_le_bytes());
        tiff.extend_from_slice(&100u32.to_le_bytes());
        tiff
    }

    fn put_entry(tiff: &mut Vec<u8>, tag: u16, field_type: u16, count: u32, value: u32) {
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&field_type.to_le_bytes());
        tiff.extend_from_slice(&count.to_le_bytes());
        tiff.extend_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn walks_all_three_ifds() {
        let tiff = sample_tiff();
        let fields = parse_tiff_fields(&tiff).unwrap();
        assert_eq!(fields.get(&(TagGroup::Ifd0, 0x010F)).unwrap(), "Xiaomi");
        assert_eq!(
            fields.get(&(TagGroup::ExifIfd, 0x9003)).unwrap(),
            "2024:01:01 10:00:00"
        );
        assert_eq!(fields.get(&(TagGroup::ExifIfd, 0x829D)).unwrap(), "179/100");
        assert_eq!(fields.get(&(TagGroup::GpsIfd, 0x0001)).unwrap(), "N");
    }

    #[test]
    fn big_endian_header_is_honored() {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM");
        tiff.extend_from_slice(&42u16.to_be_bytes());
        tiff.extend_from_slice(&8u32.to_be_bytes());
        tiff.extend_from_slice(&1u16.to_be_bytes());
        // Orientation = 6, inline SHORT
        tiff.extend_from_slice(&0x0112u16.to_be_bytes());
        tiff.extend_from_slice(&3u16.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&[0x00, 0x06, 0x00, 0x00]);
        tiff.extend_from_slice(&0u32.to_be_bytes());

        let fields = parse_tiff_fields(&tiff).unwrap();
        assert_eq!(fields.get(&(TagGroup::Ifd0, 0x0112)).unwrap(), "6");
    }

    #[test]
    fn garbage_header_is_rejected() {
        assert!(parse_tiff_fields(b"XXXXXXXX").is_none());
        assert!(parse_tiff_fields(b"II").is_none());
        assert!(parse_tiff_fields(&[]).is_none());
    }

    #[test]
    fn out_of_bounds_value_is_skipped_not_fatal() {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II");
        tiff.extend_from_slice(&42u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes());
        tiff.extend_from_slice(&1u16.to_le_bytes());
        // ASCII value claims to live far past the end of the blob
        put_entry(&mut tiff, 0x010F, 2, 100, 0xFFFF);
        tiff.extend_from_slice(&0u32.to_le_bytes());

        let fields = parse_tiff_fields(&tiff).unwrap();
        assert!(fields.is_empty());
    }

    #[test]
    fn truncated_entry_table_is_fatal() {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II");
        tiff.extend_from_slice(&42u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes());
        tiff.extend_from_slice(&40u16.to_le_bytes()); // claims 40 entries, has none
        assert!(parse_tiff_fields(&tiff).is_none());
    }

    #[test]
    fn set_get_commit_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, encode_test_jpeg()).unwrap();

        let mut handle = JpegMetadataHandle::open(&path).unwrap();
        assert_eq!(handle.get_field(&MAKE), None);

        handle.set_field(&MAKE, "Xiaomi").unwrap();
        handle.set_field(&MODEL, "2210132C").unwrap();
        handle
            .set_field(&DATE_TIME_ORIGINAL, "2024:01:01 10:00:00")
            .unwrap();
        handle
            .set_field(field_by_name("FNumber").unwrap(), "179/100")
            .unwrap();
        handle
            .set_field(field_by_name("ISOSpeedRatings").unwrap(), "400")
            .unwrap();
        handle.commit().unwrap();
        handle.reload().unwrap();

        assert_eq!(handle.get_field(&MAKE).as_deref(), Some("Xiaomi"));
        assert_eq!(handle.get_field(&MODEL).as_deref(), Some("2210132C"));
        assert_eq!(
            handle.get_field(&DATE_TIME_ORIGINAL).as_deref(),
            Some("2024:01:01 10:00:00")
        );
        assert_eq!(
            handle.get_field(field_by_name("FNumber").unwrap()).as_deref(),
            Some("179/100")
        );
        assert_eq!(
            handle
                .get_field(field_by_name("ISOSpeedRatings").unwrap())
                .as_deref(),
            Some("400")
        );

        // Still a decodable image after the EXIF splice.
        let bytes = std::fs::read(&path).unwrap();
        assert!(image::load_from_memory(&bytes).is_ok());
    }

    #[test]
    fn set_field_rejects_values_that_do_not_fit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, encode_test_jpeg()).unwrap();

        let mut handle = JpegMetadataHandle::open(&path).unwrap();
        let iso = field_by_name("ISOSpeedRatings").unwrap();
        assert!(handle.set_field(iso, "not a number").is_err());
        // Nothing staged, so commit is a no-op and the file is untouched.
        let before = std::fs::read(&path).unwrap();
        handle.commit().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn later_set_field_wins_for_the_same_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, encode_test_jpeg()).unwrap();

        let mut handle = JpegMetadataHandle::open(&path).unwrap();
        handle.set_field(&MAKE, "First").unwrap();
        handle.set_field(&MAKE, "Second").unwrap();
        handle.commit().unwrap();
        handle.reload().unwrap();
        assert_eq!(handle.get_field(&MAKE).as_deref(), Some("Second"));
    }

    #[test]
    fn open_fails_on_corrupt_exif() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, jpeg_with_garbage_exif()).unwrap();
        assert!(matches!(
            JpegMetadataHandle::open(&path),
            Err(Error::MetadataReadFailed { .. })
        ));
    }

    #[test]
    fn kind_mismatch_error_names_the_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, encode_test_jpeg()).unwrap();

        let mut handle = JpegMetadataHandle::open(&path).unwrap();
        let err = handle
            .set_field(field_by_name("GPSLatitude").unwrap(), "54.99")
            .unwrap_err();
        assert!(err.to_string().contains("GPSLatitude"), "{err}");
    }

    fn encode_test_jpeg() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(16, 16, |x, y| {
            image::Rgb([(x * 16) as u8, (y * 16) as u8, 128])
        }));
        let mut out = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90);
        img.write_with_encoder(encoder).unwrap();
        out
    }

    fn jpeg_with_garbage_exif() -> Vec<u8> {
        let mut jpeg = Jpeg::from_bytes(Bytes::from(encode_test_jpeg())).unwrap();
        jpeg.set_exif(Some(Bytes::from_static(b"XX*\0garbage, not a TIFF")));
        jpeg.encoder().bytes().to_vec()
    }
}
