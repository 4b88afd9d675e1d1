//! Facade crate for the GeoPackage to OpenStreetMap converter.
//!
//! This crate re-exports the domain model and synthesizer from
//! `gpkg2osm-core` and the GeoPackage access, conversion driver and OSM XML
//! and PBF output from `gpkg2osm-data`.

#![forbid(unsafe_code)]

pub use gpkg2osm_core::{
    EntitySynthesizer, Feature, GeometryKind, GeometryTree, LayerDescriptor, LayerValidationError,
    Member, Node, OsmGraph, OsmTags, Relation, Role, SkipReason, SynthesisError, SynthesisOutcome,
    TagMapping, TagValue, Way,
};

pub use gpkg2osm_data::{
    Conversion, ConversionReport, ConvertError, ConvertOptions, Converter, DiscoveryError,
    GeometryDecodeError, LayerDiscovery, OsmSink, PbfSink, PbfSinkError, TagMergeMode, XmlSink,
    XmlSinkError, decode_gpkg_geometry, discover_layers,
};

#[cfg(feature = "test-support")]
pub use gpkg2osm_data::test_support;
