//! Core domain for converting GeoPackage features into OpenStreetMap data.
//!
//! The crate is storage-agnostic: it receives validated
//! [`LayerDescriptor`]s, raw tag rows and decoded geometries, and turns them
//! into an [`OsmGraph`] of nodes, ways and relations. Reading GeoPackages
//! and writing OSM files live in `gpkg2osm-data`.
//!
//! ```
//! use geo::line_string;
//! use gpkg2osm_core::{
//!     EntitySynthesizer, Feature, GeometryTree, LayerDescriptor, RawTagRow, TagValue,
//!     resolve_tags,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layer = LayerDescriptor::new("roads", "geom", "LINESTRING", 4326).with_tag_column("highway");
//! layer.validate()?;
//!
//! let row = RawTagRow::default().with_column("highway", Some(TagValue::from("primary")));
//! let tags = resolve_tags(&layer, &row)?;
//! let geometry = GeometryTree::LineString(line_string![(x: 0.0, y: 0.0), (x: 0.1, y: 0.0)]);
//!
//! let mut synthesizer = EntitySynthesizer::new();
//! synthesizer.synthesize(&Feature::new(&layer, tags, geometry))?;
//! let graph = synthesizer.into_graph();
//! assert_eq!(graph.ways().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod geometry;
pub mod layer;
pub mod osm;
pub mod synth;
pub mod tags;

pub use geometry::{Feature, GeometryTree, UnsupportedGeometry};
pub use layer::{
    ACCEPTED_SRS_ID, GeometryKind, LayerDescriptor, LayerValidationError, OSM_TAGS_COLUMN,
    UnknownGeometryKind,
};
pub use osm::{ElementKind, ElementRef, Member, Node, OsmGraph, Relation, Role, Way};
pub use synth::{
    COORDINATE_SCALE, CoordKey, EntitySynthesizer, IdAllocator, NodeTable, SkipReason,
    SynthesisError, SynthesisOutcome,
};
pub use tags::{
    MalformedTagData, OsmTags, RawTagRow, TagMapping, TagValue, resolve_tags,
    tags_from_merged_json, to_osm_tags,
};
