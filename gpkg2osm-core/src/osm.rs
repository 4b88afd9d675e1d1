//! In-memory OSM entity graph produced by synthesis.
//!
//! Ways and relations refer to other primitives by identifier only. Each
//! primitive list is kept in ascending identifier order because identifiers
//! are allocated monotonically and primitives are appended as they are
//! created, which lets lookups use binary search.

use std::fmt;

use geo::Coord;

use crate::tags::OsmTags;

/// The three OSM primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    /// A point location.
    Node,
    /// An ordered list of nodes.
    Way,
    /// An ordered list of members with roles.
    Relation,
}

impl ElementKind {
    /// The name OSM formats use for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to a primitive in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementRef {
    /// Primitive kind.
    pub kind: ElementKind,
    /// Identifier within that kind.
    pub id: u64,
}

impl ElementRef {
    /// Reference a node.
    pub const fn node(id: u64) -> Self {
        Self {
            kind: ElementKind::Node,
            id,
        }
    }

    /// Reference a way.
    pub const fn way(id: u64) -> Self {
        Self {
            kind: ElementKind::Way,
            id,
        }
    }

    /// Reference a relation.
    pub const fn relation(id: u64) -> Self {
        Self {
            kind: ElementKind::Relation,
            id,
        }
    }
}

/// Role of a relation member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Outer ring of a multipolygon.
    Outer,
    /// Hole of a multipolygon.
    Inner,
    /// Part of a multi-geometry feature.
    Member,
}

impl Role {
    /// The role string written to OSM output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outer => "outer",
            Self::Inner => "inner",
            Self::Member => "member",
        }
    }
}

/// One entry in a relation's member list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    /// Referenced primitive.
    pub element: ElementRef,
    /// Role of the primitive within the relation.
    pub role: Role,
}

/// A point location.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node identifier.
    pub id: u64,
    /// Position with `x = longitude`, `y = latitude`, snapped to 1e-7 degrees.
    pub location: Coord<f64>,
    /// Tags; empty for bare vertices.
    pub tags: OsmTags,
}

/// An ordered list of node references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Way {
    /// Way identifier.
    pub id: u64,
    /// Referenced node identifiers, in order. Closed ways repeat the first id.
    pub node_ids: Vec<u64>,
    /// Tags.
    pub tags: OsmTags,
}

impl Way {
    /// Whether the first and last node references are equal.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.node_ids.len() > 1 && self.node_ids.first() == self.node_ids.last()
    }
}

/// An ordered list of members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Relation identifier.
    pub id: u64,
    /// Members, in order.
    pub members: Vec<Member>,
    /// Tags.
    pub tags: OsmTags,
}

/// All primitives synthesized during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OsmGraph {
    nodes: Vec<Node>,
    ways: Vec<Way>,
    relations: Vec<Relation>,
}

impl OsmGraph {
    /// Nodes in ascending id order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Ways in ascending id order.
    #[must_use]
    pub fn ways(&self) -> &[Way] {
        &self.ways
    }

    /// Relations in ascending id order.
    #[must_use]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: u64) -> Option<&Node> {
        self.nodes
            .binary_search_by_key(&id, |node| node.id)
            .ok()
            .and_then(|index| self.nodes.get(index))
    }

    /// Look up a way by id.
    #[must_use]
    pub fn way(&self, id: u64) -> Option<&Way> {
        self.ways
            .binary_search_by_key(&id, |way| way.id)
            .ok()
            .and_then(|index| self.ways.get(index))
    }

    /// Look up a relation by id.
    #[must_use]
    pub fn relation(&self, id: u64) -> Option<&Relation> {
        self.relations
            .binary_search_by_key(&id, |relation| relation.id)
            .ok()
            .and_then(|index| self.relations.get(index))
    }

    /// Whether the referenced primitive exists.
    #[must_use]
    pub fn contains(&self, element: ElementRef) -> bool {
        match element.kind {
            ElementKind::Node => self.node(element.id).is_some(),
            ElementKind::Way => self.way(element.id).is_some(),
            ElementKind::Relation => self.relation(element.id).is_some(),
        }
    }

    /// Tags of the referenced primitive.
    #[must_use]
    pub fn tags(&self, element: ElementRef) -> Option<&OsmTags> {
        match element.kind {
            ElementKind::Node => self.node(element.id).map(|node| &node.tags),
            ElementKind::Way => self.way(element.id).map(|way| &way.tags),
            ElementKind::Relation => self.relation(element.id).map(|relation| &relation.tags),
        }
    }

    /// References made by ways and relations that point at nothing.
    ///
    /// Empty for every graph produced by the synthesizer.
    #[must_use]
    pub fn dangling_references(&self) -> Vec<ElementRef> {
        let from_ways = self
            .ways
            .iter()
            .flat_map(|way| way.node_ids.iter().copied().map(ElementRef::node));
        let from_relations = self
            .relations
            .iter()
            .flat_map(|relation| relation.members.iter().map(|member| member.element));
        from_ways
            .chain(from_relations)
            .filter(|element| !self.contains(*element))
            .collect()
    }

    /// Total number of primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() + self.ways.len() + self.relations.len()
    }

    /// Whether the graph holds no primitives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub(crate) fn push_way(&mut self, way: Way) {
        self.ways.push(way);
    }

    pub(crate) fn push_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    pub(crate) fn tags_mut(&mut self, element: ElementRef) -> Option<&mut OsmTags> {
        match element.kind {
            ElementKind::Node => {
                let index = self
                    .nodes
                    .binary_search_by_key(&element.id, |node| node.id)
                    .ok()?;
                self.nodes.get_mut(index).map(|node| &mut node.tags)
            }
            ElementKind::Way => {
                let index = self
                    .ways
                    .binary_search_by_key(&element.id, |way| way.id)
                    .ok()?;
                self.ways.get_mut(index).map(|way| &mut way.tags)
            }
            ElementKind::Relation => {
                let index = self
                    .relations
                    .binary_search_by_key(&element.id, |relation| relation.id)
                    .ok()?;
                self.relations.get_mut(index).map(|relation| &mut relation.tags)
            }
        }
    }
}
