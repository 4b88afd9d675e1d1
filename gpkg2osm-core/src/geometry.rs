//! Decoded feature geometry and the per-row feature aggregate.

use geo::{Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use thiserror::Error;

use crate::layer::{GeometryKind, LayerDescriptor};
use crate::tags::TagMapping;

/// A decoded geometry restricted to the six kinds the synthesizer handles.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryTree {
    /// A single point.
    Point(Point<f64>),
    /// An ordered line of points.
    LineString(LineString<f64>),
    /// Outer ring followed by zero or more inner rings.
    Polygon(Polygon<f64>),
    /// Independent points.
    MultiPoint(MultiPoint<f64>),
    /// Independent lines.
    MultiLineString(MultiLineString<f64>),
    /// Independent polygons.
    MultiPolygon(MultiPolygon<f64>),
}

impl GeometryTree {
    /// The kind of this geometry.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::LineString(_) => GeometryKind::LineString,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::MultiPoint(_) => GeometryKind::MultiPoint,
            Self::MultiLineString(_) => GeometryKind::MultiLineString,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }
}

/// A `geo` geometry outside the six supported kinds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported geometry shape {shape}")]
pub struct UnsupportedGeometry {
    /// Name of the rejected shape.
    pub shape: &'static str,
}

impl TryFrom<Geometry<f64>> for GeometryTree {
    type Error = UnsupportedGeometry;

    fn try_from(geometry: Geometry<f64>) -> Result<Self, Self::Error> {
        match geometry {
            Geometry::Point(point) => Ok(Self::Point(point)),
            Geometry::LineString(line) => Ok(Self::LineString(line)),
            Geometry::Polygon(polygon) => Ok(Self::Polygon(polygon)),
            Geometry::MultiPoint(points) => Ok(Self::MultiPoint(points)),
            Geometry::MultiLineString(lines) => Ok(Self::MultiLineString(lines)),
            Geometry::MultiPolygon(polygons) => Ok(Self::MultiPolygon(polygons)),
            Geometry::Line(_) => Err(UnsupportedGeometry { shape: "Line" }),
            Geometry::GeometryCollection(_) => Err(UnsupportedGeometry {
                shape: "GeometryCollection",
            }),
            Geometry::Rect(_) => Err(UnsupportedGeometry { shape: "Rect" }),
            Geometry::Triangle(_) => Err(UnsupportedGeometry { shape: "Triangle" }),
        }
    }
}

/// One feature row ready for synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature<'a> {
    /// Layer the row belongs to.
    pub layer: &'a LayerDescriptor,
    /// Resolved tags.
    pub tags: TagMapping,
    /// Decoded geometry.
    pub geometry: GeometryTree,
}

impl<'a> Feature<'a> {
    /// Bundle a row's parts.
    pub const fn new(layer: &'a LayerDescriptor, tags: TagMapping, geometry: GeometryTree) -> Self {
        Self {
            layer,
            tags,
            geometry,
        }
    }
}
