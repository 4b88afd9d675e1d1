//! GeoPackage geometry blob decoding.
//!
//! A blob is an 8-byte header, an optional envelope and a standard WKB
//! payload:
//!
//! ```text
//! 0..2  magic "GP"
//! 2     version
//! 3     flags: bit 0 byte order of srs_id, bits 1..=3 envelope indicator,
//!       bit 4 empty geometry
//! 4..8  srs_id
//! 8..   envelope (0, 32, 48 or 64 bytes), then WKB
//! ```

use geo_traits::to_geo::ToGeoGeometry;
use gpkg2osm_core::{GeometryTree, UnsupportedGeometry};
use thiserror::Error;
use wkb::error::WkbError;

/// Leading bytes of every GeoPackage geometry blob.
pub const GPKG_MAGIC: [u8; 2] = *b"GP";

/// Length of the fixed header preceding the envelope.
pub const HEADER_LEN: usize = 8;

const FLAG_LITTLE_ENDIAN: u8 = 0b0000_0001;
const FLAG_EMPTY: u8 = 0b0001_0000;
const ENVELOPE_SHIFT: u8 = 1;
const ENVELOPE_MASK: u8 = 0b111;

/// Errors raised while decoding one geometry blob.
#[derive(Debug, Error)]
pub enum GeometryDecodeError {
    /// The blob does not start with the GeoPackage magic.
    #[error("blob does not start with the GeoPackage magic")]
    InvalidHeader,
    /// The envelope indicator is outside the defined range.
    #[error("unsupported envelope indicator {indicator}")]
    UnsupportedEnvelope {
        /// Raw 3-bit indicator.
        indicator: u8,
    },
    /// The blob ends before the header and envelope do.
    #[error("blob holds {len} bytes but the header requires {required}")]
    TruncatedBlob {
        /// Actual blob length.
        len: usize,
        /// Bytes needed for the header and envelope.
        required: usize,
    },
    /// The WKB payload could not be parsed.
    #[error("invalid WKB payload")]
    InvalidWkb {
        /// Parser error.
        #[source]
        source: WkbError,
    },
    /// The header or payload marks the geometry as empty.
    #[error("geometry is empty")]
    EmptyGeometry,
    /// The payload decodes to a shape the synthesizer does not handle.
    #[error(transparent)]
    UnsupportedGeometry(#[from] UnsupportedGeometry),
}

impl GeometryDecodeError {
    /// Stable code used in diagnostics.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::InvalidHeader => "invalid_header",
            Self::UnsupportedEnvelope { .. } => "unsupported_envelope",
            Self::TruncatedBlob { .. } => "truncated_blob",
            Self::InvalidWkb { .. } => "invalid_wkb",
            Self::EmptyGeometry => "empty_geometry",
            Self::UnsupportedGeometry(_) => "unsupported_geometry",
        }
    }
}

/// Fields of a parsed blob header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobHeader {
    /// Format version byte.
    pub version: u8,
    /// Reference system recorded in the blob.
    pub srs_id: i32,
    /// Envelope length in bytes.
    pub envelope_len: usize,
    /// Whether the empty-geometry flag is set.
    pub empty: bool,
}

impl BlobHeader {
    /// Offset of the WKB payload.
    #[must_use]
    pub const fn payload_offset(&self) -> usize {
        HEADER_LEN + self.envelope_len
    }
}

/// Envelope length for a 3-bit indicator.
pub const fn envelope_len(indicator: u8) -> Option<usize> {
    match indicator {
        0 => Some(0),
        1 => Some(32),
        2 | 3 => Some(48),
        4 => Some(64),
        _ => None,
    }
}

/// Parse and validate the header of `blob`.
pub fn parse_header(blob: &[u8]) -> Result<BlobHeader, GeometryDecodeError> {
    if !blob.starts_with(&GPKG_MAGIC) {
        return Err(GeometryDecodeError::InvalidHeader);
    }
    let Some(&[_, _, version, flags, a, b, c, d]) = blob.first_chunk::<HEADER_LEN>() else {
        return Err(GeometryDecodeError::TruncatedBlob {
            len: blob.len(),
            required: HEADER_LEN,
        });
    };

    let indicator = (flags >> ENVELOPE_SHIFT) & ENVELOPE_MASK;
    let envelope_len =
        envelope_len(indicator).ok_or(GeometryDecodeError::UnsupportedEnvelope { indicator })?;
    let srs_bytes = [a, b, c, d];
    let srs_id = if flags & FLAG_LITTLE_ENDIAN == 0 {
        i32::from_be_bytes(srs_bytes)
    } else {
        i32::from_le_bytes(srs_bytes)
    };

    let header = BlobHeader {
        version,
        srs_id,
        envelope_len,
        empty: flags & FLAG_EMPTY != 0,
    };
    if blob.len() < header.payload_offset() {
        return Err(GeometryDecodeError::TruncatedBlob {
            len: blob.len(),
            required: header.payload_offset(),
        });
    }
    Ok(header)
}

/// Decode a GeoPackage geometry blob into a [`GeometryTree`].
///
/// The envelope is skipped unread. Z and M ordinates are dropped.
pub fn decode_gpkg_geometry(blob: &[u8]) -> Result<GeometryTree, GeometryDecodeError> {
    let header = parse_header(blob)?;
    if header.empty {
        return Err(GeometryDecodeError::EmptyGeometry);
    }
    let payload = blob
        .get(header.payload_offset()..)
        .ok_or(GeometryDecodeError::TruncatedBlob {
            len: blob.len(),
            required: header.payload_offset(),
        })?;
    let wkb =
        wkb::reader::read_wkb(payload).map_err(|source| GeometryDecodeError::InvalidWkb { source })?;
    let geometry = wkb
        .try_to_geometry()
        .ok_or(GeometryDecodeError::EmptyGeometry)?;
    Ok(GeometryTree::try_from(geometry)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{WkbGeometry, gpkg_blob, gpkg_blob_with_flags};
    use geo::{LineString, point};
    use proptest::prelude::*;
    use rstest::rstest;

    fn square() -> WkbGeometry {
        WkbGeometry::Polygon(vec![vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.0, 0.0),
        ]])
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 32)]
    #[case(2, 48)]
    #[case(3, 48)]
    #[case(4, 64)]
    fn envelope_indicator_selects_length(#[case] indicator: u8, #[case] expected: usize) {
        let blob = gpkg_blob(&WkbGeometry::Point(1.0, 2.0), indicator);
        let header = parse_header(&blob).expect("valid header");
        assert_eq!(header.envelope_len, expected);
        assert_eq!(header.payload_offset(), HEADER_LEN + expected);
        assert_eq!(header.srs_id, 4326);
    }

    #[rstest]
    fn sixty_four_byte_envelope_precedes_payload() {
        let blob = gpkg_blob(&WkbGeometry::Point(13.4, 52.5), 0b100);
        let tree = decode_gpkg_geometry(&blob).expect("decodes");
        assert_eq!(tree, GeometryTree::Point(point!(x: 13.4, y: 52.5)));
    }

    #[rstest]
    #[case(5)]
    #[case(6)]
    #[case(7)]
    fn out_of_range_indicator_is_rejected(#[case] indicator: u8) {
        let blob = gpkg_blob_with_flags(&WkbGeometry::Point(0.0, 0.0), indicator << 1 | 1, 0);
        let err = decode_gpkg_geometry(&blob).expect_err("indicator is invalid");
        assert!(matches!(
            err,
            GeometryDecodeError::UnsupportedEnvelope { indicator: found } if found == indicator
        ));
        assert_eq!(err.reason_code(), "unsupported_envelope");
    }

    #[rstest]
    #[case(b"XP\0\x01\0\0\0\0".as_slice())]
    #[case(b"G".as_slice())]
    #[case(b"".as_slice())]
    fn wrong_magic_is_invalid_header(#[case] blob: &[u8]) {
        assert!(matches!(
            parse_header(blob),
            Err(GeometryDecodeError::InvalidHeader)
        ));
    }

    #[rstest]
    fn short_header_is_truncated() {
        assert!(matches!(
            parse_header(b"GP\0\x01"),
            Err(GeometryDecodeError::TruncatedBlob { len: 4, required: 8 })
        ));
    }

    #[rstest]
    fn missing_envelope_bytes_are_truncated() {
        let mut blob = gpkg_blob(&WkbGeometry::Point(0.0, 0.0), 1);
        blob.truncate(HEADER_LEN + 10);
        assert!(matches!(
            parse_header(&blob),
            Err(GeometryDecodeError::TruncatedBlob { required: 40, .. })
        ));
    }

    #[rstest]
    fn big_endian_srs_id_is_read() {
        let mut blob = gpkg_blob_with_flags(&WkbGeometry::Point(0.0, 0.0), 0, 0);
        if let Some(srs) = blob.get_mut(4..8) {
            srs.copy_from_slice(&3857_i32.to_be_bytes());
        }
        let header = parse_header(&blob).expect("valid header");
        assert_eq!(header.srs_id, 3857);
    }

    #[rstest]
    fn empty_flag_is_reported() {
        let blob = gpkg_blob_with_flags(&WkbGeometry::Point(0.0, 0.0), 0b0001_0001, 0);
        assert!(matches!(
            decode_gpkg_geometry(&blob),
            Err(GeometryDecodeError::EmptyGeometry)
        ));
    }

    #[rstest]
    fn garbage_payload_is_invalid_wkb() {
        let mut blob = gpkg_blob(&WkbGeometry::Point(0.0, 0.0), 0);
        blob.truncate(HEADER_LEN + 3);
        let err = decode_gpkg_geometry(&blob).expect_err("payload is cut short");
        assert_eq!(err.reason_code(), "invalid_wkb");
    }

    #[rstest]
    fn geometry_collections_are_unsupported() {
        let collection = WkbGeometry::Collection(vec![WkbGeometry::Point(0.0, 0.0)]);
        let err = decode_gpkg_geometry(&gpkg_blob(&collection, 0)).expect_err("unsupported");
        assert_eq!(err.reason_code(), "unsupported_geometry");
    }

    #[rstest]
    fn decodes_polygons_and_lines() {
        let tree = decode_gpkg_geometry(&gpkg_blob(&square(), 1)).expect("decodes");
        assert!(matches!(tree, GeometryTree::Polygon(ref p) if p.interiors().is_empty()));

        let line = WkbGeometry::LineString(vec![(0.0, 0.0), (1.0, 1.0)]);
        let tree = decode_gpkg_geometry(&gpkg_blob(&line, 2)).expect("decodes");
        assert_eq!(
            tree,
            GeometryTree::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]))
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Envelope contents never influence the decoded geometry.
        #[test]
        fn envelope_padding_is_ignored(
            indicator in 0_u8..=4,
            fill in any::<u8>(),
            x in -180.0_f64..180.0,
            y in -90.0_f64..90.0,
        ) {
            let point = WkbGeometry::Point(x, y);
            let baseline = decode_gpkg_geometry(&gpkg_blob(&point, 0)).expect("decodes");
            let padded = gpkg_blob_with_flags(&point, indicator << 1 | 1, fill);
            let decoded = decode_gpkg_geometry(&padded).expect("decodes");
            prop_assert_eq!(&decoded, &baseline);
            prop_assert_eq!(decode_gpkg_geometry(&padded).expect("decodes"), decoded);
        }
    }
}
