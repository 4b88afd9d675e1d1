//! SQL for fetching feature rows.
//!
//! Every query returns the geometry blob in column 0. What follows depends on
//! where the tag merge happens:
//!
//! - [`TagMergeMode::InProcess`]: the named tag columns in declaration
//!   order, then the `osm_tags` field if the layer has one;
//! - [`TagMergeMode::Sqlite`]: one JSON object already merged by SQLite's
//!   `json_patch`, then the raw `osm_tags` field so a rejected merge can be
//!   explained.

use std::fmt;
use std::str::FromStr;

use gpkg2osm_core::{LayerDescriptor, OSM_TAGS_COLUMN};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where named columns and the JSON tag field are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagMergeMode {
    /// Fetch raw columns and merge in Rust.
    #[default]
    InProcess,
    /// Let SQLite build and patch the JSON object.
    Sqlite,
}

impl TagMergeMode {
    /// Command-line spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProcess => "in-process",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for TagMergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown merge mode name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown tag merge mode {0:?}; expected in-process or sqlite")]
pub struct UnknownTagMergeMode(pub String);

impl FromStr for TagMergeMode {
    type Err = UnknownTagMergeMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "in-process" | "inprocess" => Ok(Self::InProcess),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(UnknownTagMergeMode(value.to_owned())),
        }
    }
}

/// Quote an SQL identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an SQL string literal, doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A prepared description of one layer's feature query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureQuery {
    sql: String,
    mode: TagMergeMode,
    tag_columns: Vec<String>,
    has_json_tags: bool,
}

impl FeatureQuery {
    /// Build the query for `layer`.
    pub fn for_layer(layer: &LayerDescriptor, mode: TagMergeMode) -> Self {
        let tag_columns: Vec<String> = layer.tag_columns.iter().cloned().collect();
        let json = quote_identifier(OSM_TAGS_COLUMN);

        let mut select = vec![quote_identifier(&layer.geometry_column)];
        match mode {
            TagMergeMode::InProcess => {
                select.extend(tag_columns.iter().map(|name| quote_identifier(name)));
                if layer.has_json_tags {
                    select.push(json);
                }
            }
            TagMergeMode::Sqlite => {
                select.push(merge_expression(&tag_columns, layer.has_json_tags));
                if layer.has_json_tags {
                    select.push(json);
                }
            }
        }

        let sql = format!(
            "SELECT {} FROM {}",
            select.join(", "),
            quote_identifier(&layer.name)
        );
        Self {
            sql,
            mode,
            tag_columns,
            has_json_tags: layer.has_json_tags,
        }
    }

    /// The SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Merge placement the query was built for.
    #[must_use]
    pub const fn mode(&self) -> TagMergeMode {
        self.mode
    }

    /// Named tag columns, in result-column order.
    #[must_use]
    pub fn tag_columns(&self) -> &[String] {
        &self.tag_columns
    }

    /// Whether the JSON tag field is selected.
    #[must_use]
    pub const fn has_json_tags(&self) -> bool {
        self.has_json_tags
    }
}

/// `json_object(...)` over the named columns, patched with the JSON field.
///
/// BLOB cells become `NULL` so they are dropped exactly as the in-process
/// merge drops them. Finite REAL cells are printed with 17 significant digits
/// and a forced decimal point, so they parse back to the same `f64` and stay
/// floats. A malformed JSON field yields `NULL`.
fn merge_expression(tag_columns: &[String], has_json_tags: bool) -> String {
    let pairs = tag_columns
        .iter()
        .map(|name| format!("{}, {}", quote_literal(name), tag_cell(&quote_identifier(name))))
        .collect::<Vec<_>>()
        .join(", ");
    let base = format!("json_object({pairs})");
    if !has_json_tags {
        return base;
    }
    let json = quote_identifier(OSM_TAGS_COLUMN);
    format!(
        "CASE WHEN {json} IS NULL THEN {base} \
         WHEN json_valid({json}) THEN json_patch({base}, {json}) END"
    )
}

fn tag_cell(column: &str) -> String {
    format!(
        "CASE typeof({column}) WHEN 'blob' THEN NULL \
         WHEN 'real' THEN CASE WHEN abs({column}) <= {max:e} \
         THEN json(printf('%!.17g', {column})) ELSE {column} END \
         ELSE {column} END",
        max = f64::MAX
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn layer() -> LayerDescriptor {
        LayerDescriptor::new("roads", "geom", "LINESTRING", 4326)
            .with_tag_column("highway")
            .with_tag_column("name")
    }

    #[rstest]
    #[case("plain", "\"plain\"")]
    #[case("we\"ird", "\"we\"\"ird\"")]
    fn quotes_identifiers(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(quote_identifier(name), expected);
    }

    #[rstest]
    fn quotes_literals() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[rstest]
    fn in_process_selects_raw_columns() {
        let query = FeatureQuery::for_layer(&layer().with_json_tags(true), TagMergeMode::InProcess);
        assert_eq!(
            query.sql(),
            r#"SELECT "geom", "highway", "name", "osm_tags" FROM "roads""#
        );
        assert_eq!(query.tag_columns(), ["highway", "name"]);
    }

    #[rstest]
    fn sqlite_without_json_builds_object_only() {
        let query = FeatureQuery::for_layer(&layer(), TagMergeMode::Sqlite);
        assert!(query.sql().starts_with("SELECT \"geom\", json_object('highway', "));
        assert!(!query.sql().contains("json_patch"));
    }

    #[rstest]
    fn sqlite_with_json_patches_object() {
        let query = FeatureQuery::for_layer(&layer().with_json_tags(true), TagMergeMode::Sqlite);
        assert!(query.sql().contains("json_patch(json_object("));
        assert!(query.sql().ends_with(r#", "osm_tags" FROM "roads""#));
    }

    #[rstest]
    fn sqlite_prints_reals_losslessly() {
        let query = FeatureQuery::for_layer(&layer(), TagMergeMode::Sqlite);
        assert!(query.sql().contains(r#"json(printf('%!.17g', "highway"))"#));
        assert!(query.sql().contains("WHEN 'blob' THEN NULL"));
    }

    #[rstest]
    #[case("in-process", TagMergeMode::InProcess)]
    #[case("SQLite", TagMergeMode::Sqlite)]
    fn parses_merge_modes(#[case] text: &str, #[case] expected: TagMergeMode) {
        assert_eq!(text.parse::<TagMergeMode>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_merge_mode() {
        assert!("database".parse::<TagMergeMode>().is_err());
    }
}
