//! Output sinks for synthesized graphs.

use std::io::{self, Write};

use gpkg2osm_core::{OsmGraph, OsmTags};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use thiserror::Error;

/// Value of the `generator` attribute on the root element.
pub const GENERATOR: &str = concat!("gpkg2osm ", env!("CARGO_PKG_VERSION"));

/// Destination for a finished graph.
pub trait OsmSink {
    /// Error raised while writing.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write every primitive of `graph`.
    fn write_graph(&mut self, graph: &OsmGraph) -> Result<(), Self::Error>;
}

/// Errors raised by [`XmlSink`].
#[derive(Debug, Error)]
pub enum XmlSinkError {
    /// The underlying writer failed.
    #[error("failed to write OSM XML")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl From<io::Error> for XmlSinkError {
    fn from(source: io::Error) -> Self {
        Self::Write { source }
    }
}

/// Writes OSM XML 0.6.
///
/// Nodes come first, then ways, then relations, each in ascending id
/// order, so every reference points backwards in the document.
///
/// # Examples
/// ```
/// use gpkg2osm_core::OsmGraph;
/// use gpkg2osm_data::{OsmSink, XmlSink};
///
/// # fn main() -> Result<(), gpkg2osm_data::XmlSinkError> {
/// let mut sink = XmlSink::new(Vec::new());
/// sink.write_graph(&OsmGraph::default())?;
/// let xml = String::from_utf8_lossy(&sink.into_inner()).into_owned();
/// assert!(xml.contains("<osm version=\"0.6\""));
/// # Ok(())
/// # }
/// ```
pub struct XmlSink<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XmlSink<W> {
    /// Wrap `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::new_with_indent(inner, b' ', 2),
        }
    }

    /// Recover the wrapped writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_tags(&mut self, tags: &OsmTags) -> io::Result<()> {
        for (key, value) in tags {
            let tag = BytesStart::new("tag")
                .with_attributes([("k", key.as_str()), ("v", value.as_str())]);
            self.writer.write_event(Event::Empty(tag))?;
        }
        Ok(())
    }

    fn write_element<'a>(
        &mut self,
        name: &str,
        attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
        has_children: bool,
        children: impl FnOnce(&mut Self) -> io::Result<()>,
    ) -> io::Result<()> {
        let start = BytesStart::new(name).with_attributes(attributes);
        if !has_children {
            return self.writer.write_event(Event::Empty(start));
        }
        self.writer.write_event(Event::Start(start))?;
        children(self)?;
        self.writer.write_event(Event::End(BytesEnd::new(name)))
    }
}

impl<W: Write> OsmSink for XmlSink<W> {
    type Error = XmlSinkError;

    fn write_graph(&mut self, graph: &OsmGraph) -> Result<(), Self::Error> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let root = BytesStart::new("osm").with_attributes([
            ("version", "0.6"),
            ("generator", GENERATOR),
        ]);
        self.writer.write_event(Event::Start(root))?;

        for node in graph.nodes() {
            let id = node.id.to_string();
            let lat = format!("{:.7}", node.location.y);
            let lon = format!("{:.7}", node.location.x);
            let attributes = [
                ("id", id.as_str()),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("version", "1"),
                ("visible", "true"),
            ];
            self.write_element("node", attributes, !node.tags.is_empty(), |sink| {
                sink.write_tags(&node.tags)
            })?;
        }

        for way in graph.ways() {
            let id = way.id.to_string();
            let attributes = [("id", id.as_str()), ("version", "1"), ("visible", "true")];
            self.write_element("way", attributes, true, |sink| {
                for node_id in &way.node_ids {
                    let reference = node_id.to_string();
                    let nd = BytesStart::new("nd").with_attributes([("ref", reference.as_str())]);
                    sink.writer.write_event(Event::Empty(nd))?;
                }
                sink.write_tags(&way.tags)
            })?;
        }

        for relation in graph.relations() {
            let id = relation.id.to_string();
            let attributes = [("id", id.as_str()), ("version", "1"), ("visible", "true")];
            self.write_element("relation", attributes, true, |sink| {
                for member in &relation.members {
                    let reference = member.element.id.to_string();
                    let tag = BytesStart::new("member").with_attributes([
                        ("type", member.element.kind.as_str()),
                        ("ref", reference.as_str()),
                        ("role", member.role.as_str()),
                    ]);
                    sink.writer.write_event(Event::Empty(tag))?;
                }
                sink.write_tags(&relation.tags)
            })?;
        }

        self.writer.write_event(Event::End(BytesEnd::new("osm")))?;
        self.writer.get_mut().write_all(b"\n")?;
        self.writer.get_mut().flush()?;
        Ok(())
    }
}
