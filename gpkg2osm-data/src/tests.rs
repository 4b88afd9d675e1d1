//! End-to-end tests across discovery, conversion and output.

mod behaviour;

use crate::test_support::{FixtureLayer, GeoPackageFixture, WkbGeometry, gpkg_blob, text};
use crate::{
    Converter, ConvertOptions, OsmSink, TagMergeMode, XmlSink, discover_layers,
};
use rstest::rstest;
use rusqlite::Connection;
use tempfile::TempDir;

fn build_on_disk(dir: &TempDir) -> Connection {
    let path = dir.path().join("fixture.gpkg");
    let gpkg = GeoPackageFixture::with_connection(Connection::open(&path).expect("open database"))
        .expect("schema");
    gpkg.add_layer(
        &FixtureLayer::new("parks", "MULTIPOLYGON")
            .tag_column("leisure")
            .json_tags(),
    )
    .expect("parks");
    gpkg.add_layer(&FixtureLayer::new("trees", "POINT").json_tags())
        .expect("trees");

    let park = WkbGeometry::MultiPolygon(vec![
        vec![
            vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 0.0)],
            vec![(1.0, 0.5), (2.0, 0.5), (2.0, 1.5), (1.0, 0.5)],
        ],
        vec![vec![(10.0, 0.0), (11.0, 0.0), (11.0, 1.0), (10.0, 0.0)]],
    ]);
    gpkg.insert(
        "parks",
        Some(gpkg_blob(&park, 1)),
        &[
            ("leisure", text("park")),
            ("osm_tags", text(r#"{"name": "Twin Parks"}"#)),
        ],
    )
    .expect("park row");
    gpkg.insert(
        "trees",
        Some(gpkg_blob(&WkbGeometry::Point(4.0, 4.0), 0)),
        &[("osm_tags", text(r#"{"natural": "tree"}"#))],
    )
    .expect("tree row");
    gpkg.into_connection()
}

#[rstest]
#[case(TagMergeMode::InProcess)]
#[case(TagMergeMode::Sqlite)]
fn converts_a_geopackage_on_disk(#[case] tag_merge: TagMergeMode) {
    let dir = TempDir::new().expect("temp dir");
    let connection = build_on_disk(&dir);

    let discovery = discover_layers(&connection).expect("discovery succeeds");
    let conversion = Converter::new(ConvertOptions { tag_merge })
        .convert(&connection, &discovery.layers)
        .expect("conversion succeeds");
    let graph = &conversion.graph;

    assert_eq!(conversion.report.layers_converted, 2);
    assert_eq!(conversion.report.rows_converted, 2);
    assert_eq!(graph.relations().len(), 2);
    assert_eq!(graph.ways().len(), 3);
    assert_eq!(graph.nodes().len(), 9);
    assert!(graph.dangling_references().is_empty());

    let umbrella = graph.relation(2).expect("umbrella relation");
    assert_eq!(umbrella.tags.get("name").map(String::as_str), Some("Twin Parks"));
    assert_eq!(umbrella.tags.get("leisure").map(String::as_str), Some("park"));

    let tree = graph
        .nodes()
        .iter()
        .find(|node| node.tags.contains_key("natural"))
        .expect("tree node tagged");
    assert_eq!(tree.id, 3, "tree reuses the park corner node");

    let mut sink = XmlSink::new(Vec::new());
    sink.write_graph(graph).expect("xml written");
    let xml = String::from_utf8(sink.into_inner()).expect("utf-8");
    assert_eq!(xml.matches("<relation ").count(), 2);
}
