//! Entity synthesis: decoded features in, OSM primitives out.
//!
//! One [`EntitySynthesizer`] owns all state of a conversion run: the
//! identifier counters, the node table that collapses coincident vertices
//! into one node, and the growing entity graph. Features are synthesized one
//! at a time; every primitive a feature references is added to the graph
//! before the primitive that references it.
//!
//! Per kind:
//! - a point resolves to a node and its tags attach to that node unless an
//!   earlier point already tagged it;
//! - a line string becomes one way;
//! - a polygon becomes one closed way per ring. Without holes the outer way
//!   carries the tags; with holes a `type=multipolygon` relation with
//!   `outer`/`inner` members carries them. Ring position alone decides the
//!   role;
//! - a multi-geometry synthesizes each part untagged. A single surviving part
//!   takes the tags itself; several parts are wrapped in one relation whose
//!   members have role `member` and which carries the tags.

mod ids;
mod node_table;

use std::fmt;

use geo::{LineString, Point, Polygon};
use log::{debug, warn};
use thiserror::Error;

pub use ids::IdAllocator;
pub use node_table::{COORDINATE_SCALE, CoordKey, NodeTable};

use crate::geometry::{Feature, GeometryTree};
use crate::osm::{ElementKind, ElementRef, Member, Node, OsmGraph, Relation, Role, Way};
use crate::tags::{OsmTags, to_osm_tags};

/// Minimum node references of a way built from a line string.
const MIN_LINE_NODES: usize = 2;

/// Minimum node references of a way built from a ring, closing node included.
const MIN_RING_NODES: usize = 3;

/// Errors that threaten run-wide invariants and therefore end the run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SynthesisError {
    /// A coordinate cannot be turned into a deduplication key.
    #[error("coordinate ({x}, {y}) cannot be represented at 1e-7 degree precision")]
    CoordinateOverflow {
        /// Longitude as decoded.
        x: f64,
        /// Latitude as decoded.
        y: f64,
    },
    /// No identifiers are left for a primitive kind.
    #[error("{kind} identifier space exhausted")]
    IdSpaceExhausted {
        /// Kind whose counter ran out.
        kind: ElementKind,
    },
}

/// Why a feature produced no primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    /// Fewer than two distinct consecutive vertices.
    DegenerateLineString,
    /// The outer ring has too few distinct vertices.
    DegeneratePolygon,
    /// A multi-geometry with no usable parts.
    EmptyCollection,
}

impl SkipReason {
    /// Stable code used in diagnostics.
    #[must_use]
    pub const fn reason_code(self) -> &'static str {
        match self {
            Self::DegenerateLineString => "degenerate_linestring",
            Self::DegeneratePolygon => "degenerate_polygon",
            Self::EmptyCollection => "empty_collection",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason_code())
    }
}

/// Result of synthesizing one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// Top-level primitives that carry the feature's tags.
    Emitted(Vec<ElementRef>),
    /// Nothing was produced.
    Skipped(SkipReason),
}

/// Converts features into OSM primitives for one run.
///
/// # Examples
/// ```
/// use geo::point;
/// use gpkg2osm_core::{
///     EntitySynthesizer, Feature, GeometryTree, LayerDescriptor, SynthesisOutcome, TagMapping,
/// };
///
/// # fn main() -> Result<(), gpkg2osm_core::SynthesisError> {
/// let layer = LayerDescriptor::new("pois", "geom", "POINT", 4326).with_json_tags(true);
/// let tags = TagMapping::from([("amenity".to_owned(), "cafe".into())]);
/// let feature = Feature::new(&layer, tags, GeometryTree::Point(point!(x: 13.4, y: 52.5)));
///
/// let mut synthesizer = EntitySynthesizer::new();
/// let outcome = synthesizer.synthesize(&feature)?;
/// assert!(matches!(outcome, SynthesisOutcome::Emitted(_)));
///
/// let graph = synthesizer.into_graph();
/// assert_eq!(graph.nodes().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct EntitySynthesizer {
    ids: IdAllocator,
    nodes: NodeTable,
    graph: OsmGraph,
}

impl EntitySynthesizer {
    /// Start a run with empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesize one feature into the graph.
    pub fn synthesize(
        &mut self,
        feature: &Feature<'_>,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        let layer = feature.layer.name.as_str();
        if let Ok(declared) = feature.layer.geometry_kind()
            && declared != feature.geometry.kind()
        {
            debug!(
                "Layer {} declares {} but row carries {}",
                layer,
                declared,
                feature.geometry.kind()
            );
        }
        let tags = to_osm_tags(&feature.tags);

        match &feature.geometry {
            GeometryTree::Point(point) => {
                let node = self.point(*point, &tags, layer)?;
                Ok(SynthesisOutcome::Emitted(vec![node]))
            }
            GeometryTree::MultiPoint(points) => {
                let mut nodes = Vec::with_capacity(points.0.len());
                for point in points {
                    let node = self.point(*point, &tags, layer)?;
                    if !nodes.contains(&node) {
                        nodes.push(node);
                    }
                }
                if nodes.is_empty() {
                    return Ok(SynthesisOutcome::Skipped(SkipReason::EmptyCollection));
                }
                Ok(SynthesisOutcome::Emitted(nodes))
            }
            GeometryTree::LineString(line) => Ok(match self.line(line)? {
                Some(way) => self.tag(way, tags),
                None => SynthesisOutcome::Skipped(SkipReason::DegenerateLineString),
            }),
            GeometryTree::Polygon(polygon) => Ok(match self.polygon(polygon, layer)? {
                Some(element) => self.tag(element, tags),
                None => SynthesisOutcome::Skipped(SkipReason::DegeneratePolygon),
            }),
            GeometryTree::MultiLineString(lines) => {
                let mut parts = Vec::with_capacity(lines.0.len());
                for (index, line) in lines.iter().enumerate() {
                    match self.line(line)? {
                        Some(way) => parts.push(way),
                        None => warn!(
                            "Layer {}: skipped part {} ({})",
                            layer,
                            index,
                            SkipReason::DegenerateLineString
                        ),
                    }
                }
                self.combine(parts, tags)
            }
            GeometryTree::MultiPolygon(polygons) => {
                let mut parts = Vec::with_capacity(polygons.0.len());
                for (index, polygon) in polygons.iter().enumerate() {
                    match self.polygon(polygon, layer)? {
                        Some(element) => parts.push(element),
                        None => warn!(
                            "Layer {}: skipped part {} ({})",
                            layer,
                            index,
                            SkipReason::DegeneratePolygon
                        ),
                    }
                }
                self.combine(parts, tags)
            }
        }
    }

    /// The graph built so far.
    #[must_use]
    pub const fn graph(&self) -> &OsmGraph {
        &self.graph
    }

    /// The node table built so far.
    #[must_use]
    pub const fn node_table(&self) -> &NodeTable {
        &self.nodes
    }

    /// Finish the run and hand over the graph.
    #[must_use]
    pub fn into_graph(self) -> OsmGraph {
        self.graph
    }

    fn point(
        &mut self,
        point: Point<f64>,
        tags: &OsmTags,
        layer: &str,
    ) -> Result<ElementRef, SynthesisError> {
        let key = CoordKey::from_coord(point.0)?;
        let node = ElementRef::node(self.node_id(key)?);
        if !self.nodes.claim(key) {
            if self.graph.tags_mut(node).is_some_and(|existing| existing != tags) {
                warn!(
                    "Layer {}: node {} already claimed by an earlier point; tags discarded",
                    layer, node.id
                );
            }
            return Ok(node);
        }
        if let Some(existing) = self.graph.tags_mut(node) {
            existing.clone_from(tags);
        }
        Ok(node)
    }

    fn line(&mut self, line: &LineString<f64>) -> Result<Option<ElementRef>, SynthesisError> {
        let keys = vertex_keys(line)?;
        if keys.len() < MIN_LINE_NODES {
            return Ok(None);
        }
        self.way(&keys).map(Some)
    }

    fn polygon(
        &mut self,
        polygon: &Polygon<f64>,
        layer: &str,
    ) -> Result<Option<ElementRef>, SynthesisError> {
        let outer = vertex_keys(polygon.exterior())?;
        if outer.len() < MIN_RING_NODES {
            return Ok(None);
        }
        let mut inners = Vec::with_capacity(polygon.interiors().len());
        for (index, ring) in polygon.interiors().iter().enumerate() {
            let keys = vertex_keys(ring)?;
            if keys.len() < MIN_RING_NODES {
                warn!("Layer {}: dropped degenerate inner ring {}", layer, index);
                continue;
            }
            inners.push(keys);
        }

        let outer_way = self.way(&outer)?;
        if inners.is_empty() {
            return Ok(Some(outer_way));
        }

        let mut members = Vec::with_capacity(inners.len() + 1);
        members.push(Member {
            element: outer_way,
            role: Role::Outer,
        });
        for keys in &inners {
            members.push(Member {
                element: self.way(keys)?,
                role: Role::Inner,
            });
        }
        let tags = OsmTags::from([("type".to_owned(), "multipolygon".to_owned())]);
        self.relation(members, tags).map(Some)
    }

    fn combine(
        &mut self,
        parts: Vec<ElementRef>,
        tags: OsmTags,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        if parts.len() < 2 {
            return Ok(match parts.first() {
                Some(single) => self.tag(*single, tags),
                None => SynthesisOutcome::Skipped(SkipReason::EmptyCollection),
            });
        }
        let members = parts
            .into_iter()
            .map(|element| Member {
                element,
                role: Role::Member,
            })
            .collect();
        let umbrella = self.relation(members, tags)?;
        Ok(SynthesisOutcome::Emitted(vec![umbrella]))
    }

    /// Merge `tags` into a freshly built way or relation.
    fn tag(&mut self, element: ElementRef, tags: OsmTags) -> SynthesisOutcome {
        if let Some(existing) = self.graph.tags_mut(element) {
            existing.extend(tags);
        }
        SynthesisOutcome::Emitted(vec![element])
    }

    fn node_id(&mut self, key: CoordKey) -> Result<u64, SynthesisError> {
        if let Some(id) = self.nodes.get(key) {
            return Ok(id);
        }
        let id = self.ids.allocate(ElementKind::Node)?;
        self.graph.push_node(Node {
            id,
            location: key.to_coord(),
            tags: OsmTags::new(),
        });
        Ok(self.nodes.insert(key, id))
    }

    fn way(&mut self, keys: &[CoordKey]) -> Result<ElementRef, SynthesisError> {
        let node_ids = keys
            .iter()
            .map(|key| self.node_id(*key))
            .collect::<Result<Vec<_>, _>>()?;
        let id = self.ids.allocate(ElementKind::Way)?;
        self.graph.push_way(Way {
            id,
            node_ids,
            tags: OsmTags::new(),
        });
        Ok(ElementRef::way(id))
    }

    fn relation(
        &mut self,
        members: Vec<Member>,
        tags: OsmTags,
    ) -> Result<ElementRef, SynthesisError> {
        let id = self.ids.allocate(ElementKind::Relation)?;
        self.graph.push_relation(Relation { id, members, tags });
        Ok(ElementRef::relation(id))
    }
}

/// Keys of a line's vertices with consecutive duplicates collapsed.
///
/// All keys are computed before any node is allocated so a rejected or
/// failing geometry leaves no orphan nodes behind.
fn vertex_keys(line: &LineString<f64>) -> Result<Vec<CoordKey>, SynthesisError> {
    let mut keys = line
        .coords()
        .map(|coord| CoordKey::from_coord(*coord))
        .collect::<Result<Vec<_>, _>>()?;
    keys.dedup();
    Ok(keys)
}
