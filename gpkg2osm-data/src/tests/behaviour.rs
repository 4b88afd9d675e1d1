//! Behavioural tests for converting GeoPackages using rstest-bdd.

use crate::test_support::{FixtureLayer, GeoPackageFixture, WkbGeometry, gpkg_blob, text};
use crate::{Conversion, Converter, LayerDiscovery, discover_layers};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::{cell::RefCell, fs, path::PathBuf};

#[fixture]
pub fn gpkg() -> RefCell<Option<GeoPackageFixture>> {
    RefCell::new(None)
}

#[fixture]
pub fn outcome() -> RefCell<Option<(LayerDiscovery, Conversion)>> {
    RefCell::new(None)
}

fn fresh() -> GeoPackageFixture {
    GeoPackageFixture::in_memory().expect("create GeoPackage schema")
}

fn with_outcome<T>(
    outcome: &RefCell<Option<(LayerDiscovery, Conversion)>>,
    check: impl FnOnce(&LayerDiscovery, &Conversion) -> T,
) -> T {
    let borrowed = outcome.borrow();
    let (discovery, conversion) = borrowed.as_ref().expect("conversion was run");
    check(discovery, conversion)
}

#[given("a GeoPackage with two roads meeting at one point")]
fn roads_meeting(#[from(gpkg)] gpkg: &RefCell<Option<GeoPackageFixture>>) {
    let fixture = fresh();
    fixture
        .add_layer(&FixtureLayer::new("roads", "LINESTRING").tag_column("highway"))
        .expect("roads layer");
    for (coords, highway) in [
        (vec![(-0.1276, 51.5072), (-0.1270, 51.5080)], "primary"),
        (vec![(-0.1270, 51.5080), (-0.1260, 51.5072)], "residential"),
    ] {
        fixture
            .insert(
                "roads",
                Some(gpkg_blob(&WkbGeometry::LineString(coords), 1)),
                &[("highway", text(highway))],
            )
            .expect("road row");
    }
    *gpkg.borrow_mut() = Some(fixture);
}

#[given("a GeoPackage whose only layer uses SRS 3857")]
fn mercator_only(#[from(gpkg)] gpkg: &RefCell<Option<GeoPackageFixture>>) {
    let fixture = fresh();
    fixture
        .add_layer(
            &FixtureLayer::new("tiles", "POINT")
                .tag_column("name")
                .json_tags()
                .srs(3857),
        )
        .expect("tiles layer");
    fixture
        .insert(
            "tiles",
            Some(gpkg_blob(&WkbGeometry::Point(-14_226.0, 6_711_542.0), 0)),
            &[("name", text("somewhere"))],
        )
        .expect("tile row");
    *gpkg.borrow_mut() = Some(fixture);
}

#[given("a GeoPackage with one valid and one damaged point")]
fn damaged_point(#[from(gpkg)] gpkg: &RefCell<Option<GeoPackageFixture>>) {
    let fixture = fresh();
    fixture
        .add_layer(&FixtureLayer::new("pois", "POINT").json_tags())
        .expect("pois layer");
    fixture
        .insert(
            "pois",
            Some(gpkg_blob(&WkbGeometry::Point(2.35, 48.85), 0)),
            &[("osm_tags", text(r#"{"amenity": "bench"}"#))],
        )
        .expect("valid row");
    fixture
        .insert(
            "pois",
            Some(b"WKB without header".to_vec()),
            &[("osm_tags", text(r#"{"amenity": "bench"}"#))],
        )
        .expect("damaged row");
    *gpkg.borrow_mut() = Some(fixture);
}

#[when("the GeoPackage is converted")]
fn convert(
    #[from(gpkg)] gpkg: &RefCell<Option<GeoPackageFixture>>,
    #[from(outcome)] outcome: &RefCell<Option<(LayerDiscovery, Conversion)>>,
) {
    let result = {
        let guard = gpkg.borrow();
        let fixture = guard.as_ref().expect("GeoPackage prepared");
        let discovery = discover_layers(fixture.connection()).expect("discovery succeeds");
        let conversion = Converter::default()
            .convert(fixture.connection(), &discovery.layers)
            .expect("conversion succeeds");
        (discovery, conversion)
    };
    *outcome.borrow_mut() = Some(result);
}

#[then("the OSM document holds {ways} ways and {nodes} nodes")]
fn document_counts(
    #[from(outcome)] outcome: &RefCell<Option<(LayerDiscovery, Conversion)>>,
    ways: usize,
    nodes: usize,
) {
    with_outcome(outcome, |_, conversion| {
        assert_eq!(conversion.graph.ways().len(), ways, "way count");
        assert_eq!(conversion.graph.nodes().len(), nodes, "node count");
    });
}

#[then("both ways reference the shared node")]
fn shared_node(#[from(outcome)] outcome: &RefCell<Option<(LayerDiscovery, Conversion)>>) {
    with_outcome(outcome, |_, conversion| {
        let ways = conversion.graph.ways();
        let shared: Vec<_> = ways
            .iter()
            .map(|way| way.node_ids.contains(&2))
            .collect();
        assert_eq!(shared, [true, true]);
    });
}

#[then("no layer is exported")]
fn nothing_exported(#[from(outcome)] outcome: &RefCell<Option<(LayerDiscovery, Conversion)>>) {
    with_outcome(outcome, |discovery, conversion| {
        assert!(discovery.layers.is_empty());
        assert_eq!(discovery.rejected.len(), 1);
        assert_eq!(conversion.report.rows_read, 0);
    });
}

#[then("{count} row is skipped as {reason}")]
fn rows_skipped(
    #[from(outcome)] outcome: &RefCell<Option<(LayerDiscovery, Conversion)>>,
    count: usize,
    reason: String,
) {
    let reason = reason.trim_matches('"').to_owned();
    with_outcome(outcome, |_, conversion| {
        assert_eq!(conversion.report.skipped_for(&reason), count);
        assert_eq!(conversion.report.rows_converted, 1);
    });
}

#[test]
fn scenario_indices_follow_feature_order() {
    let feature = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/features/geopackage_conversion.feature");
    let contents = fs::read_to_string(&feature).unwrap_or_else(|err| {
        panic!("failed to read feature file {feature:?}: {err}");
    });
    let titles: Vec<&str> = contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .collect();
    assert_eq!(
        titles,
        [
            "converting roads that share an endpoint",
            "excluding a web mercator layer",
            "skipping rows with damaged geometry",
        ]
    );
}

#[scenario(path = "tests/features/geopackage_conversion.feature", index = 0)]
fn converting_shared_endpoints(
    gpkg: RefCell<Option<GeoPackageFixture>>,
    outcome: RefCell<Option<(LayerDiscovery, Conversion)>>,
) {
    let _ = (gpkg, outcome);
}

#[scenario(path = "tests/features/geopackage_conversion.feature", index = 1)]
fn excluding_web_mercator(
    gpkg: RefCell<Option<GeoPackageFixture>>,
    outcome: RefCell<Option<(LayerDiscovery, Conversion)>>,
) {
    let _ = (gpkg, outcome);
}

#[scenario(path = "tests/features/geopackage_conversion.feature", index = 2)]
fn skipping_damaged_rows(
    gpkg: RefCell<Option<GeoPackageFixture>>,
    outcome: RefCell<Option<(LayerDiscovery, Conversion)>>,
) {
    let _ = (gpkg, outcome);
}
