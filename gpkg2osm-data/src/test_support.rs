//! Builders for GeoPackage blobs and schemas used by tests.
//!
//! WKB is written by hand in little-endian order so fixtures do not depend on
//! the decoder under test.

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use crate::query::quote_identifier;

const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOINT: u32 = 4;
const WKB_MULTILINESTRING: u32 = 5;
const WKB_MULTIPOLYGON: u32 = 6;
const WKB_COLLECTION: u32 = 7;

/// A geometry description that can be serialised as WKB.
#[derive(Debug, Clone, PartialEq)]
pub enum WkbGeometry {
    /// `(x, y)`.
    Point(f64, f64),
    /// Vertices.
    LineString(Vec<(f64, f64)>),
    /// Rings; the first is the outer ring.
    Polygon(Vec<Vec<(f64, f64)>>),
    /// Points.
    MultiPoint(Vec<(f64, f64)>),
    /// Lines.
    MultiLineString(Vec<Vec<(f64, f64)>>),
    /// Polygons.
    MultiPolygon(Vec<Vec<Vec<(f64, f64)>>>),
    /// Nested geometries.
    Collection(Vec<WkbGeometry>),
}

impl WkbGeometry {
    /// Little-endian WKB encoding.
    #[must_use]
    pub fn to_wkb(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Self::Point(x, y) => {
                header(out, WKB_POINT);
                coord(out, (*x, *y));
            }
            Self::LineString(coords) => {
                header(out, WKB_LINESTRING);
                coords_with_count(out, coords);
            }
            Self::Polygon(rings) => {
                header(out, WKB_POLYGON);
                count(out, rings.len());
                for ring in rings {
                    coords_with_count(out, ring);
                }
            }
            Self::MultiPoint(points) => {
                header(out, WKB_MULTIPOINT);
                count(out, points.len());
                for point in points {
                    Self::Point(point.0, point.1).write(out);
                }
            }
            Self::MultiLineString(lines) => {
                header(out, WKB_MULTILINESTRING);
                count(out, lines.len());
                for line in lines {
                    Self::LineString(line.clone()).write(out);
                }
            }
            Self::MultiPolygon(polygons) => {
                header(out, WKB_MULTIPOLYGON);
                count(out, polygons.len());
                for polygon in polygons {
                    Self::Polygon(polygon.clone()).write(out);
                }
            }
            Self::Collection(members) => {
                header(out, WKB_COLLECTION);
                count(out, members.len());
                for member in members {
                    member.write(out);
                }
            }
        }
    }
}

fn header(out: &mut Vec<u8>, kind: u32) {
    out.push(1);
    out.extend_from_slice(&kind.to_le_bytes());
}

fn count(out: &mut Vec<u8>, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
}

fn coord(out: &mut Vec<u8>, (x, y): (f64, f64)) {
    out.extend_from_slice(&x.to_le_bytes());
    out.extend_from_slice(&y.to_le_bytes());
}

fn coords_with_count(out: &mut Vec<u8>, coords: &[(f64, f64)]) {
    count(out, coords.len());
    for pair in coords {
        coord(out, *pair);
    }
}

/// Wrap `geometry` in a GeoPackage blob for SRS 4326 with a zero-filled
/// envelope of the size `indicator` selects.
pub fn gpkg_blob(geometry: &WkbGeometry, indicator: u8) -> Vec<u8> {
    gpkg_blob_with_flags(geometry, (indicator << 1) | 1, 0)
}

/// Wrap `geometry` using raw `flags`, filling the envelope with `fill`.
///
/// Unknown envelope indicators get no envelope bytes.
pub fn gpkg_blob_with_flags(geometry: &WkbGeometry, flags: u8, fill: u8) -> Vec<u8> {
    let envelope = crate::blob::envelope_len((flags >> 1) & 0b111).unwrap_or(0);
    let srs = if flags & 1 == 0 {
        4326_i32.to_be_bytes()
    } else {
        4326_i32.to_le_bytes()
    };
    let mut blob = vec![b'G', b'P', 0, flags];
    blob.extend_from_slice(&srs);
    blob.resize(blob.len() + envelope, fill);
    blob.extend(geometry.to_wkb());
    blob
}

/// A feature layer to create in a [`GeoPackageFixture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureLayer {
    /// Table name.
    pub name: String,
    /// Declared geometry type.
    pub geometry_type: String,
    /// Declared SRS id.
    pub srs_id: i32,
    /// Columns described as OSM tags.
    pub tag_columns: Vec<String>,
    /// Columns present but not tag-bearing.
    pub plain_columns: Vec<String>,
    /// Whether to add the `osm_tags` JSON column.
    pub json_tags: bool,
}

impl FixtureLayer {
    /// A layer in SRS 4326 with no columns besides the geometry.
    pub fn new(name: &str, geometry_type: &str) -> Self {
        Self {
            name: name.to_owned(),
            geometry_type: geometry_type.to_owned(),
            srs_id: 4326,
            tag_columns: Vec::new(),
            plain_columns: Vec::new(),
            json_tags: false,
        }
    }

    /// Add a tag-bearing column.
    #[must_use]
    pub fn tag_column(mut self, name: &str) -> Self {
        self.tag_columns.push(name.to_owned());
        self
    }

    /// Add a column without a tag description.
    #[must_use]
    pub fn plain_column(mut self, name: &str) -> Self {
        self.plain_columns.push(name.to_owned());
        self
    }

    /// Add the `osm_tags` column.
    #[must_use]
    pub const fn json_tags(mut self) -> Self {
        self.json_tags = true;
        self
    }

    /// Override the SRS id.
    #[must_use]
    pub const fn srs(mut self, srs_id: i32) -> Self {
        self.srs_id = srs_id;
        self
    }
}

/// A minimal GeoPackage schema in an SQLite connection.
#[derive(Debug)]
pub struct GeoPackageFixture {
    connection: Connection,
}

impl GeoPackageFixture {
    /// Create the metadata tables in an in-memory database.
    pub fn in_memory() -> rusqlite::Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Create the metadata tables in `connection`.
    pub fn with_connection(connection: Connection) -> rusqlite::Result<Self> {
        connection.execute_batch(
            "CREATE TABLE gpkg_geometry_columns (
                table_name TEXT NOT NULL,
                column_name TEXT NOT NULL,
                geometry_type_name TEXT NOT NULL,
                srs_id INTEGER NOT NULL,
                z TINYINT NOT NULL,
                m TINYINT NOT NULL,
                PRIMARY KEY (table_name, column_name)
            );
            CREATE TABLE gpkg_data_columns (
                table_name TEXT NOT NULL,
                column_name TEXT NOT NULL,
                name TEXT,
                title TEXT,
                description TEXT,
                mime_type TEXT,
                constraint_name TEXT,
                PRIMARY KEY (table_name, column_name)
            );",
        )?;
        Ok(Self { connection })
    }

    /// Drop `gpkg_data_columns`, which the format makes optional.
    pub fn without_data_columns(self) -> rusqlite::Result<Self> {
        self.connection
            .execute_batch("DROP TABLE gpkg_data_columns;")?;
        Ok(self)
    }

    /// Create a feature table and describe it in the metadata tables.
    pub fn add_layer(&self, layer: &FixtureLayer) -> rusqlite::Result<()> {
        let mut columns = vec![
            "fid INTEGER PRIMARY KEY AUTOINCREMENT".to_owned(),
            "geom BLOB".to_owned(),
        ];
        columns.extend(
            layer
                .tag_columns
                .iter()
                .chain(&layer.plain_columns)
                .map(|name| quote_identifier(name)),
        );
        if layer.json_tags {
            columns.push("osm_tags TEXT".to_owned());
        }
        self.connection.execute_batch(&format!(
            "CREATE TABLE {} ({});",
            quote_identifier(&layer.name),
            columns.join(", ")
        ))?;
        self.connection.execute(
            "INSERT INTO gpkg_geometry_columns VALUES (?1, 'geom', ?2, ?3, 0, 0)",
            (&layer.name, &layer.geometry_type, layer.srs_id),
        )?;
        for column in &layer.tag_columns {
            self.describe(&layer.name, column, "OSM tag", None)?;
        }
        if layer.json_tags {
            self.describe(&layer.name, "osm_tags", "Free-form tags", Some("application/json"))?;
        }
        Ok(())
    }

    /// Add a `gpkg_data_columns` entry.
    pub fn describe(
        &self,
        table: &str,
        column: &str,
        description: &str,
        mime_type: Option<&str>,
    ) -> rusqlite::Result<()> {
        self.connection.execute(
            "INSERT INTO gpkg_data_columns (table_name, column_name, name, description, mime_type)
             VALUES (?1, ?2, ?2, ?3, ?4)",
            (table, column, description, mime_type),
        )?;
        Ok(())
    }

    /// Insert one feature row.
    pub fn insert(
        &self,
        table: &str,
        geometry: Option<Vec<u8>>,
        values: &[(&str, Value)],
    ) -> rusqlite::Result<()> {
        let mut names = vec!["geom".to_owned()];
        names.extend(values.iter().map(|(name, _)| quote_identifier(name)));
        let placeholders = (1..=names.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params = vec![geometry.map_or(Value::Null, Value::Blob)];
        params.extend(values.iter().map(|(_, value)| value.clone()));
        self.connection.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                quote_identifier(table),
                names.join(", ")
            ),
            params_from_iter(params),
        )?;
        Ok(())
    }

    /// Borrow the connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Hand over the connection.
    #[must_use]
    pub fn into_connection(self) -> Connection {
        self.connection
    }
}

/// Shorthand for a text cell.
pub fn text(value: &str) -> Value {
    Value::Text(value.to_owned())
}
