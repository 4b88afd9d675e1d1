//! OSM PBF output.
//!
//! The file is a sequence of frames: a 4-byte big-endian header length, a
//! `BlobHeader`, then a zlib-compressed `Blob`. The first frame carries the
//! `OSMHeader` block; every further frame carries one `OSMData` block holding
//! primitives of a single kind. Nodes are written as dense nodes.

pub mod proto;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::io::{self, Write};

use flate2::Compression;
use flate2::write::ZlibEncoder;
use gpkg2osm_core::{COORDINATE_SCALE, ElementKind, Node, OsmGraph, OsmTags, Relation, Way};
use prost::Message;
use thiserror::Error;

use crate::sink::{GENERATOR, OsmSink};

/// Primitives per data block.
pub const ENTITIES_PER_BLOCK: usize = 8_000;

/// Largest uncompressed block a reader has to accept.
pub const MAX_BLOCK_SIZE: usize = 32 * 1024 * 1024;

const HEADER_BLOCK: &str = "OSMHeader";
const DATA_BLOCK: &str = "OSMData";

/// Coordinate granularity in nanodegrees; one unit is 1e-7 degrees.
const GRANULARITY: i32 = 100;

/// Errors raised by [`PbfSink`].
#[derive(Debug, Error)]
pub enum PbfSinkError {
    /// The underlying writer or the compressor failed.
    #[error("failed to write OSM PBF")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// An identifier does not fit the signed ids of the format.
    #[error("{kind} id {id} exceeds the PBF id range")]
    IdOutOfRange {
        /// Kind of the primitive.
        kind: ElementKind,
        /// Offending id.
        id: u64,
    },
    /// An encoded block is larger than readers accept.
    #[error("{block_type} block of {size} bytes exceeds the 32 MiB limit")]
    BlockTooLarge {
        /// `OSMHeader` or `OSMData`.
        block_type: &'static str,
        /// Encoded size.
        size: usize,
    },
    /// A block references more distinct strings than the format can index.
    #[error("string table overflow")]
    StringTableFull,
}

impl From<io::Error> for PbfSinkError {
    fn from(source: io::Error) -> Self {
        Self::Write { source }
    }
}

/// Writes the OSM PBF binary format.
///
/// Output is sorted by kind then id, and advertised as such in the header.
///
/// # Examples
/// ```
/// use gpkg2osm_core::OsmGraph;
/// use gpkg2osm_data::{OsmSink, PbfSink};
///
/// # fn main() -> Result<(), gpkg2osm_data::PbfSinkError> {
/// let mut sink = PbfSink::new(Vec::new());
/// sink.write_graph(&OsmGraph::default())?;
/// assert!(!sink.into_inner().is_empty());
/// # Ok(())
/// # }
/// ```
pub struct PbfSink<W: Write> {
    inner: W,
    compression: Compression,
    entities_per_block: usize,
}

impl<W: Write> PbfSink<W> {
    /// Wrap `inner` with default compression and block size.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            compression: Compression::default(),
            entities_per_block: ENTITIES_PER_BLOCK,
        }
    }

    /// Limit each data block to `count` primitives (at least one).
    #[must_use]
    pub fn with_entities_per_block(mut self, count: usize) -> Self {
        self.entities_per_block = count.max(1);
        self
    }

    /// Recover the wrapped writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_blob(&mut self, block_type: &'static str, payload: &[u8]) -> Result<(), PbfSinkError> {
        let raw_size = block_size(block_type, payload.len())?;
        let mut encoder = ZlibEncoder::new(Vec::new(), self.compression);
        encoder.write_all(payload)?;
        let blob = proto::Blob {
            raw: None,
            raw_size: Some(raw_size),
            zlib_data: Some(encoder.finish()?),
        }
        .encode_to_vec();
        let header = proto::BlobHeader {
            r#type: block_type.to_owned(),
            datasize: block_size(block_type, blob.len())?,
        }
        .encode_to_vec();
        let header_len = u32::try_from(header.len()).map_err(|_| PbfSinkError::BlockTooLarge {
            block_type,
            size: header.len(),
        })?;

        self.inner.write_all(&header_len.to_be_bytes())?;
        self.inner.write_all(&header)?;
        self.inner.write_all(&blob)?;
        Ok(())
    }
}

impl<W: Write> OsmSink for PbfSink<W> {
    type Error = PbfSinkError;

    fn write_graph(&mut self, graph: &OsmGraph) -> Result<(), Self::Error> {
        self.write_blob(HEADER_BLOCK, &header_block(graph.nodes()).encode_to_vec())?;
        for chunk in graph.nodes().chunks(self.entities_per_block) {
            self.write_blob(DATA_BLOCK, &node_block(chunk)?.encode_to_vec())?;
        }
        for chunk in graph.ways().chunks(self.entities_per_block) {
            self.write_blob(DATA_BLOCK, &way_block(chunk)?.encode_to_vec())?;
        }
        for chunk in graph.relations().chunks(self.entities_per_block) {
            self.write_blob(DATA_BLOCK, &relation_block(chunk)?.encode_to_vec())?;
        }
        self.inner.flush()?;
        Ok(())
    }
}

fn block_size(block_type: &'static str, size: usize) -> Result<i32, PbfSinkError> {
    i32::try_from(size)
        .ok()
        .filter(|_| size <= MAX_BLOCK_SIZE)
        .ok_or(PbfSinkError::BlockTooLarge { block_type, size })
}

/// Interns the strings of one block. Index 0 stays empty as the format
/// reserves it as the dense-node tag delimiter.
struct StringTableBuilder {
    index: HashMap<String, i32>,
    strings: Vec<Vec<u8>>,
}

impl StringTableBuilder {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            strings: vec![Vec::new()],
        }
    }

    fn intern(&mut self, value: &str) -> Result<i32, PbfSinkError> {
        if let Some(id) = self.index.get(value) {
            return Ok(*id);
        }
        let id = i32::try_from(self.strings.len()).map_err(|_| PbfSinkError::StringTableFull)?;
        self.strings.push(value.as_bytes().to_vec());
        self.index.insert(value.to_owned(), id);
        Ok(id)
    }

    fn tags(&mut self, tags: &OsmTags) -> Result<(Vec<u32>, Vec<u32>), PbfSinkError> {
        let mut keys = Vec::with_capacity(tags.len());
        let mut vals = Vec::with_capacity(tags.len());
        for (key, value) in tags {
            keys.push(self.intern(key)?.cast_unsigned());
            vals.push(self.intern(value)?.cast_unsigned());
        }
        Ok((keys, vals))
    }

    fn finish(self) -> proto::StringTable {
        proto::StringTable { s: self.strings }
    }
}

fn header_block(nodes: &[Node]) -> proto::HeaderBlock {
    proto::HeaderBlock {
        bbox: bounding_box(nodes),
        required_features: vec!["OsmSchema-V0.6".to_owned(), "DenseNodes".to_owned()],
        optional_features: vec!["Sort.Type_then_ID".to_owned()],
        writingprogram: Some(GENERATOR.to_owned()),
    }
}

fn bounding_box(nodes: &[Node]) -> Option<proto::HeaderBBox> {
    let nanodegrees = i64::from(GRANULARITY);
    let mut positions = nodes.iter().map(|node| {
        (
            units(node.location.x) * nanodegrees,
            units(node.location.y) * nanodegrees,
        )
    });
    let (x, y) = positions.next()?;
    let initial = proto::HeaderBBox {
        left: x,
        right: x,
        top: y,
        bottom: y,
    };
    Some(positions.fold(initial, |bbox, (lon, lat)| proto::HeaderBBox {
        left: bbox.left.min(lon),
        right: bbox.right.max(lon),
        top: bbox.top.max(lat),
        bottom: bbox.bottom.min(lat),
    }))
}

fn primitive_block(strings: StringTableBuilder, group: proto::PrimitiveGroup) -> proto::PrimitiveBlock {
    proto::PrimitiveBlock {
        stringtable: strings.finish(),
        primitivegroup: vec![group],
        granularity: Some(GRANULARITY),
        ..proto::PrimitiveBlock::default()
    }
}

fn node_block(nodes: &[Node]) -> Result<proto::PrimitiveBlock, PbfSinkError> {
    let mut strings = StringTableBuilder::new();
    let mut ids = Vec::with_capacity(nodes.len());
    let mut lats = Vec::with_capacity(nodes.len());
    let mut lons = Vec::with_capacity(nodes.len());
    let mut keys_vals = Vec::new();
    for node in nodes {
        ids.push(signed_id(ElementKind::Node, node.id)?);
        lats.push(units(node.location.y));
        lons.push(units(node.location.x));
        for (key, value) in &node.tags {
            keys_vals.push(strings.intern(key)?);
            keys_vals.push(strings.intern(value)?);
        }
        keys_vals.push(0);
    }

    let count = nodes.len();
    let dense = proto::DenseNodes {
        id: deltas(ids),
        denseinfo: Some(proto::DenseInfo {
            version: vec![1; count],
            timestamp: vec![0; count],
            changeset: vec![0; count],
            uid: vec![0; count],
            user_sid: vec![0; count],
        }),
        lat: deltas(lats),
        lon: deltas(lons),
        keys_vals,
    };
    Ok(primitive_block(
        strings,
        proto::PrimitiveGroup {
            dense: Some(dense),
            ..proto::PrimitiveGroup::default()
        },
    ))
}

fn way_block(ways: &[Way]) -> Result<proto::PrimitiveBlock, PbfSinkError> {
    let mut strings = StringTableBuilder::new();
    let mut encoded = Vec::with_capacity(ways.len());
    for way in ways {
        let (keys, vals) = strings.tags(&way.tags)?;
        let refs = way
            .node_ids
            .iter()
            .map(|id| signed_id(ElementKind::Node, *id))
            .collect::<Result<Vec<_>, _>>()?;
        encoded.push(proto::Way {
            id: signed_id(ElementKind::Way, way.id)?,
            keys,
            vals,
            info: Some(first_version()),
            refs: deltas(refs),
        });
    }
    Ok(primitive_block(
        strings,
        proto::PrimitiveGroup {
            ways: encoded,
            ..proto::PrimitiveGroup::default()
        },
    ))
}

fn relation_block(relations: &[Relation]) -> Result<proto::PrimitiveBlock, PbfSinkError> {
    let mut strings = StringTableBuilder::new();
    let mut encoded = Vec::with_capacity(relations.len());
    for relation in relations {
        let (keys, vals) = strings.tags(&relation.tags)?;
        let mut roles_sid = Vec::with_capacity(relation.members.len());
        let mut memids = Vec::with_capacity(relation.members.len());
        let mut types = Vec::with_capacity(relation.members.len());
        for member in &relation.members {
            roles_sid.push(strings.intern(member.role.as_str())?);
            memids.push(signed_id(member.element.kind, member.element.id)?);
            types.push(member_type(member.element.kind));
        }
        encoded.push(proto::Relation {
            id: signed_id(ElementKind::Relation, relation.id)?,
            keys,
            vals,
            info: Some(first_version()),
            roles_sid,
            memids: deltas(memids),
            types,
        });
    }
    Ok(primitive_block(
        strings,
        proto::PrimitiveGroup {
            relations: encoded,
            ..proto::PrimitiveGroup::default()
        },
    ))
}

const fn first_version() -> proto::Info {
    proto::Info { version: Some(1) }
}

const fn member_type(kind: ElementKind) -> i32 {
    match kind {
        ElementKind::Node => 0,
        ElementKind::Way => 1,
        ElementKind::Relation => 2,
    }
}

fn signed_id(kind: ElementKind, id: u64) -> Result<i64, PbfSinkError> {
    i64::try_from(id).map_err(|_| PbfSinkError::IdOutOfRange { kind, id })
}

/// Degrees to granularity units. Node positions are already snapped to this
/// grid, so rounding only removes representation error.
fn units(degrees: f64) -> i64 {
    (degrees * COORDINATE_SCALE).round() as i64
}

fn deltas(values: Vec<i64>) -> Vec<i64> {
    let mut previous = 0;
    values
        .into_iter()
        .map(|value| {
            let delta = value - previous;
            previous = value;
            delta
        })
        .collect()
}
