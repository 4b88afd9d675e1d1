//! GeoPackage access and OSM output for gpkg2osm.
//!
//! Responsibilities:
//! - Discover spatial layers and their tag columns from GeoPackage metadata.
//! - Fetch feature rows, with the tag merge in Rust or in SQLite.
//! - Decode GeoPackage geometry blobs.
//! - Drive conversion runs and write OSM XML or PBF.
//!
//! Boundaries:
//! - Synthesis rules live in `gpkg2osm-core`.
//! - No global mutable state; one [`Converter`] run owns all run state.

pub mod blob;
pub mod convert;
pub mod discovery;
pub mod pbf;
pub mod query;
pub mod reader;
pub mod sink;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

#[cfg(test)]
mod tests;

pub use blob::{BlobHeader, GeometryDecodeError, decode_gpkg_geometry, parse_header};
pub use convert::{Conversion, ConversionReport, ConvertError, ConvertOptions, Converter, RowError};
pub use discovery::{DiscoveryError, LayerDiscovery, RejectedLayer, discover_layers};
pub use pbf::{PbfSink, PbfSinkError};
pub use query::{FeatureQuery, TagMergeMode, UnknownTagMergeMode};
pub use reader::{FetchedTags, RawFeature, ReadError, read_layer};
pub use sink::{GENERATOR, OsmSink, XmlSink, XmlSinkError};
