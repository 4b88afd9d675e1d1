//! Static metadata describing one GeoPackage feature layer.
//!
//! Descriptors are produced by layer discovery, validated once, and shared
//! read-only by the tag resolver and the entity synthesizer for the rest of
//! the run.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The only reference system accepted by the converter: WGS84 (`EPSG:4326`).
pub const ACCEPTED_SRS_ID: i32 = 4326;

/// Name of the JSON column that carries free-form OSM tags.
pub const OSM_TAGS_COLUMN: &str = "osm_tags";

/// Geometry kinds a layer may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryKind {
    /// A single position.
    Point,
    /// An ordered run of positions.
    LineString,
    /// An outer ring with optional holes.
    Polygon,
    /// A collection of points.
    MultiPoint,
    /// A collection of line strings.
    MultiLineString,
    /// A collection of polygons.
    MultiPolygon,
}

impl GeometryKind {
    /// All supported kinds, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Point,
        Self::LineString,
        Self::Polygon,
        Self::MultiPoint,
        Self::MultiLineString,
        Self::MultiPolygon,
    ];

    /// The upper-case name used by `gpkg_geometry_columns.geometry_type_name`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "POINT",
            Self::LineString => "LINESTRING",
            Self::Polygon => "POLYGON",
            Self::MultiPoint => "MULTIPOINT",
            Self::MultiLineString => "MULTILINESTRING",
            Self::MultiPolygon => "MULTIPOLYGON",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a geometry type name is not one of the supported kinds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported geometry type {0:?}")]
pub struct UnknownGeometryKind(pub String);

impl FromStr for GeometryKind {
    type Err = UnknownGeometryKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownGeometryKind(value.to_owned()))
    }
}

/// Metadata about one spatial layer, as reported by layer discovery.
///
/// The declared geometry type is kept as the raw string so that a layer with
/// an unsupported type can still be described in diagnostics; use
/// [`LayerDescriptor::geometry_kind`] to obtain the parsed kind.
///
/// # Examples
/// ```
/// use gpkg2osm_core::{GeometryKind, LayerDescriptor};
///
/// let layer = LayerDescriptor::new("roads", "geom", "LINESTRING", 4326)
///     .with_tag_column("highway")
///     .with_json_tags(true);
/// assert!(layer.validate().is_ok());
/// assert_eq!(layer.geometry_kind(), Ok(GeometryKind::LineString));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescriptor {
    /// Table name; unique within a GeoPackage.
    pub name: String,
    /// Column holding the geometry blobs.
    pub geometry_column: String,
    /// Declared geometry type name.
    pub geometry_type: String,
    /// Reference-system identifier of the geometry column.
    pub srs_id: i32,
    /// Columns whose values become OSM tags.
    pub tag_columns: BTreeSet<String>,
    /// Whether the layer carries an `osm_tags` JSON column.
    pub has_json_tags: bool,
    /// Whether geometries carry Z ordinates. Informational only.
    pub has_z: bool,
    /// Whether geometries carry M ordinates. Informational only.
    pub has_m: bool,
}

/// Reasons a layer is excluded from a conversion run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LayerValidationError {
    /// The layer has neither tag columns nor a JSON tag field.
    #[error("no OSM tags")]
    NoTagSource,
    /// The layer is not stored in the accepted reference system.
    #[error("invalid SRS {found}, must be EPSG:4326")]
    UnsupportedSrs {
        /// SRS id declared by the layer.
        found: i32,
    },
    /// The declared geometry type is not one of the supported kinds.
    #[error("invalid geometry type: {0}")]
    UnsupportedGeometry(#[from] UnknownGeometryKind),
}

impl LayerValidationError {
    /// Stable code used in diagnostics.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::NoTagSource => "no_tag_source",
            Self::UnsupportedSrs { .. } => "unsupported_srs",
            Self::UnsupportedGeometry(_) => "unsupported_geometry_type",
        }
    }
}

impl LayerDescriptor {
    /// Create a descriptor with no tag sources.
    pub fn new(
        name: impl Into<String>,
        geometry_column: impl Into<String>,
        geometry_type: impl Into<String>,
        srs_id: i32,
    ) -> Self {
        Self {
            name: name.into(),
            geometry_column: geometry_column.into(),
            geometry_type: geometry_type.into(),
            srs_id,
            tag_columns: BTreeSet::new(),
            has_json_tags: false,
            has_z: false,
            has_m: false,
        }
    }

    /// Add a tag column. Duplicates collapse.
    #[must_use]
    pub fn with_tag_column(mut self, column: impl Into<String>) -> Self {
        self.tag_columns.insert(column.into());
        self
    }

    /// Set whether the layer carries the JSON tag field.
    #[must_use]
    pub const fn with_json_tags(mut self, has_json_tags: bool) -> Self {
        self.has_json_tags = has_json_tags;
        self
    }

    /// Parse the declared geometry type.
    pub fn geometry_kind(&self) -> Result<GeometryKind, UnknownGeometryKind> {
        self.geometry_type.parse()
    }

    /// Whether at least one tag source exists.
    #[must_use]
    pub fn has_tag_source(&self) -> bool {
        self.has_json_tags || !self.tag_columns.is_empty()
    }

    /// Check that the layer can be exported.
    ///
    /// Checks run in a fixed order (tag sources, SRS, geometry type) so the
    /// reported reason is deterministic when several checks fail.
    pub fn validate(&self) -> Result<GeometryKind, LayerValidationError> {
        if !self.has_tag_source() {
            return Err(LayerValidationError::NoTagSource);
        }
        if self.srs_id != ACCEPTED_SRS_ID {
            return Err(LayerValidationError::UnsupportedSrs { found: self.srs_id });
        }
        Ok(self.geometry_kind()?)
    }
}
