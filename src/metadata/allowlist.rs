//! Registry of the EXIF fields carried from source to output.
//!
//! Copying is allowlist-driven: only the fields listed here move, everything
//! else (thumbnails, maker-note sub-structures we cannot rewrite safely,
//! vendor XMP) stays behind. Each entry pins the tag id, the IFD it lives in
//! and the kind its value is written back as, so a field reads and writes
//! the same way on every run.

use super::value::TagKind;

/// One copyable EXIF field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagField {
    /// ExifTool-style name, used in logs and reports.
    pub name: &'static str,
    /// TIFF tag id within its IFD.
    pub tag_id: u16,
    /// IFD the tag lives in.
    pub group: TagGroup,
    /// Kind the value is encoded as when written.
    pub kind: TagKind,
}

/// IFD a tag belongs to. Tag ids are only unique within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagGroup {
    Ifd0,
    ExifIfd,
    GpsIfd,
}

const fn field(name: &'static str, tag_id: u16, group: TagGroup, kind: TagKind) -> TagField {
    TagField {
        name,
        tag_id,
        group,
        kind,
    }
}

/// The three fields re-checked after a merge. Capture timestamp, make and
/// model are the fields downstream tooling keys on, so a silent mismatch
/// there is worth a dedicated signal.
pub const DATE_TIME_ORIGINAL: TagField = field(
    "DateTimeOriginal",
    0x9003,
    TagGroup::ExifIfd,
    TagKind::Ascii,
);
pub const MAKE: TagField = field("Make", 0x010F, TagGroup::Ifd0, TagKind::Ascii);
pub const MODEL: TagField = field("Model", 0x0110, TagGroup::Ifd0, TagKind::Ascii);

pub static VERIFIED_FIELDS: &[TagField] = &[DATE_TIME_ORIGINAL, MAKE, MODEL];

/// Every field the merge copies, grouped roughly the way EXIF groups them.
pub static COPIED_FIELDS: &[TagField] = &[
    // Timestamps
    field("DateTime", 0x0132, TagGroup::Ifd0, TagKind::Ascii),
    DATE_TIME_ORIGINAL,
    field("DateTimeDigitized", 0x9004, TagGroup::ExifIfd, TagKind::Ascii),
    field("SubSecTime", 0x9290, TagGroup::ExifIfd, TagKind::Ascii),
    field("SubSecTimeOriginal", 0x9291, TagGroup::ExifIfd, TagKind::Ascii),
    field("SubSecTimeDigitized", 0x9292, TagGroup::ExifIfd, TagKind::Ascii),
    // Camera identity
    MAKE,
    MODEL,
    field("Software", 0x0131, TagGroup::Ifd0, TagKind::Ascii),
    field("Artist", 0x013B, TagGroup::Ifd0, TagKind::Ascii),
    field("Copyright", 0x8298, TagGroup::Ifd0, TagKind::Ascii),
    field("CameraOwnerName", 0xA430, TagGroup::ExifIfd, TagKind::Ascii),
    field("BodySerialNumber", 0xA431, TagGroup::ExifIfd, TagKind::Ascii),
    field("ImageUniqueID", 0xA420, TagGroup::ExifIfd, TagKind::Ascii),
    // Exposure
    field("ExposureTime", 0x829A, TagGroup::ExifIfd, TagKind::Rational),
    field("FNumber", 0x829D, TagGroup::ExifIfd, TagKind::Rational),
    field("ExposureProgram", 0x8822, TagGroup::ExifIfd, TagKind::Short),
    field("ISOSpeedRatings", 0x8827, TagGroup::ExifIfd, TagKind::Short),
    field("ExposureBiasValue", 0x9204, TagGroup::ExifIfd, TagKind::SRational),
    field("ExposureMode", 0xA402, TagGroup::ExifIfd, TagKind::Short),
    field("ExposureIndex", 0xA215, TagGroup::ExifIfd, TagKind::Rational),
    field("MeteringMode", 0x9207, TagGroup::ExifIfd, TagKind::Short),
    field("LightSource", 0x9208, TagGroup::ExifIfd, TagKind::Short),
    field("Flash", 0x9209, TagGroup::ExifIfd, TagKind::Short),
    field("FlashEnergy", 0xA20B, TagGroup::ExifIfd, TagKind::Rational),
    field("WhiteBalance", 0xA403, TagGroup::ExifIfd, TagKind::Short),
    // Lens
    field("FocalLength", 0x920A, TagGroup::ExifIfd, TagKind::Rational),
    field("FocalLengthIn35mmFilm", 0xA405, TagGroup::ExifIfd, TagKind::Short),
    field("LensMake", 0xA433, TagGroup::ExifIfd, TagKind::Ascii),
    field("LensModel", 0xA434, TagGroup::ExifIfd, TagKind::Ascii),
    field("LensSerialNumber", 0xA435, TagGroup::ExifIfd, TagKind::Ascii),
    field("LensSpecification", 0xA432, TagGroup::ExifIfd, TagKind::Rational),
    // Geometry and rendering intent
    field("Orientation", 0x0112, TagGroup::Ifd0, TagKind::Short),
    field("XResolution", 0x011A, TagGroup::Ifd0, TagKind::Rational),
    field("YResolution", 0x011B, TagGroup::Ifd0, TagKind::Rational),
    field("ResolutionUnit", 0x0128, TagGroup::Ifd0, TagKind::Short),
    field("PixelXDimension", 0xA002, TagGroup::ExifIfd, TagKind::Long),
    field("PixelYDimension", 0xA003, TagGroup::ExifIfd, TagKind::Long),
    field("ColorSpace", 0xA001, TagGroup::ExifIfd, TagKind::Short),
    // Scene
    field("DigitalZoomRatio", 0xA404, TagGroup::ExifIfd, TagKind::Rational),
    field("SceneCaptureType", 0xA406, TagGroup::ExifIfd, TagKind::Short),
    field("GainControl", 0xA407, TagGroup::ExifIfd, TagKind::Short),
    field("Contrast", 0xA408, TagGroup::ExifIfd, TagKind::Short),
    field("Saturation", 0xA409, TagGroup::ExifIfd, TagKind::Short),
    field("Sharpness", 0xA40A, TagGroup::ExifIfd, TagKind::Short),
    field("SubjectDistance", 0x9206, TagGroup::ExifIfd, TagKind::Rational),
    field("SubjectDistanceRange", 0xA40C, TagGroup::ExifIfd, TagKind::Short),
    field("SubjectArea", 0x9214, TagGroup::ExifIfd, TagKind::Short),
    field("SubjectLocation", 0xA214, TagGroup::ExifIfd, TagKind::Short),
    // Sensor and capture internals
    field("SensingMethod", 0xA217, TagGroup::ExifIfd, TagKind::Short),
    field("CustomRendered", 0xA401, TagGroup::ExifIfd, TagKind::Short),
    field("FocalPlaneXResolution", 0xA20E, TagGroup::ExifIfd, TagKind::Rational),
    field("FocalPlaneYResolution", 0xA20F, TagGroup::ExifIfd, TagKind::Rational),
    field("FocalPlaneResolutionUnit", 0xA210, TagGroup::ExifIfd, TagKind::Short),
    field("ExifVersion", 0x9000, TagGroup::ExifIfd, TagKind::Undefined),
    field("FlashpixVersion", 0xA000, TagGroup::ExifIfd, TagKind::Undefined),
    field("FileSource", 0xA300, TagGroup::ExifIfd, TagKind::Undefined),
    field("SceneType", 0xA301, TagGroup::ExifIfd, TagKind::Undefined),
    field("CFAPattern", 0xA302, TagGroup::ExifIfd, TagKind::Undefined),
    field("SpatialFrequencyResponse", 0xA20C, TagGroup::ExifIfd, TagKind::Undefined),
    field("DeviceSettingDescription", 0xA40B, TagGroup::ExifIfd, TagKind::Undefined),
    // Free text and vendor blobs
    field("UserComment", 0x9286, TagGroup::ExifIfd, TagKind::Undefined),
    field("MakerNote", 0x927C, TagGroup::ExifIfd, TagKind::Undefined),
    field("RelatedSoundFile", 0xA004, TagGroup::ExifIfd, TagKind::Ascii),
    // GPS
    field("GPSLatitudeRef", 0x0001, TagGroup::GpsIfd, TagKind::Ascii),
    field("GPSLatitude", 0x0002, TagGroup::GpsIfd, TagKind::Rational),
    field("GPSLongitudeRef", 0x0003, TagGroup::GpsIfd, TagKind::Ascii),
    field("GPSLongitude", 0x0004, TagGroup::GpsIfd, TagKind::Rational),
    field("GPSAltitudeRef", 0x0005, TagGroup::GpsIfd, TagKind::Byte),
    field("GPSAltitude", 0x0006, TagGroup::GpsIfd, TagKind::Rational),
    field("GPSTimeStamp", 0x0007, TagGroup::GpsIfd, TagKind::Rational),
    field("GPSDateStamp", 0x001D, TagGroup::GpsIfd, TagKind::Ascii),
    field("GPSProcessingMethod", 0x001B, TagGroup::GpsIfd, TagKind::Undefined),
    field("GPSAreaInformation", 0x001C, TagGroup::GpsIfd, TagKind::Undefined),
    field("GPSDifferential", 0x001E, TagGroup::GpsIfd, TagKind::Short),
    field("GPSHPositioningError", 0x001F, TagGroup::GpsIfd, TagKind::Rational),
];

/// Looks a field up by its ExifTool-style name. Used by the CLI when
/// reporting and by tests.
pub fn field_by_name(name: &str) -> Option<&'static TagField> {
    COPIED_FIELDS.iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn registry_covers_the_expected_surface() {
        assert!(COPIED_FIELDS.len() >= 70, "got {}", COPIED_FIELDS.len());
    }

    #[test]
    fn tag_ids_are_unique_within_their_group() {
        let mut seen = HashSet::new();
        for f in COPIED_FIELDS {
            assert!(seen.insert((f.group, f.tag_id)), "duplicate entry {}", f.name);
        }
    }

    #[test]
    fn verified_fields_are_also_copied() {
        for f in VERIFIED_FIELDS {
            assert!(
                COPIED_FIELDS.iter().any(|c| c == f),
                "{} missing from copy list",
                f.name
            );
        }
    }

    #[test]
    fn lookup_by_name() {
        let f = field_by_name("GPSLatitude").unwrap();
        assert_eq!(f.tag_id, 0x0002);
        assert_eq!(f.group, TagGroup::GpsIfd);
        assert!(field_by_name("NotAField").is_none());
    }
}
