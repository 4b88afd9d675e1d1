//! Test helpers that lay out GeoPackages on disk.

use camino::{Utf8Path, Utf8PathBuf};
use gpkg2osm_data::test_support::{FixtureLayer, GeoPackageFixture, WkbGeometry, gpkg_blob, text};
use rusqlite::Connection;
use tempfile::TempDir;

pub(super) fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir")
}

/// Write `roads.gpkg` under `root` with one road per coordinate run.
pub(super) fn write_roads(root: &Utf8Path, roads: &[Vec<(f64, f64)>]) -> Utf8PathBuf {
    let path = root.join("roads.gpkg");
    let connection = Connection::open(path.as_std_path()).expect("create GeoPackage");
    let gpkg = GeoPackageFixture::with_connection(connection).expect("schema");
    gpkg.add_layer(&FixtureLayer::new("roads", "LINESTRING").tag_column("highway"))
        .expect("roads layer");
    for coords in roads {
        let blob = gpkg_blob(&WkbGeometry::LineString(coords.clone()), 1);
        gpkg.insert("roads", Some(blob), &[("highway", text("residential"))])
            .expect("road row");
    }
    path
}
