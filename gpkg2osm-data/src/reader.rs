//! Reading feature rows from a layer table.

use gpkg2osm_core::{
    LayerDescriptor, MalformedTagData, RawTagRow, TagMapping, TagValue, resolve_tags,
    tags_from_merged_json,
};
use log::{debug, warn};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row};
use thiserror::Error;

use crate::query::{FeatureQuery, TagMergeMode};

/// Errors that stop a layer from being read.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The feature query could not be prepared.
    #[error("failed to prepare feature query for layer {layer}")]
    Prepare {
        /// Layer name.
        layer: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Executing the query or stepping through its rows failed.
    #[error("failed to read features from layer {layer}")]
    Query {
        /// Layer name.
        layer: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
}

/// Tag data as fetched, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedTags {
    /// Raw cells to be merged in process.
    Raw(RawTagRow),
    /// Output of the SQLite-side merge.
    Merged {
        /// Merged JSON object; `None` when SQLite rejected the field.
        merged: Option<String>,
        /// The raw JSON field, if selected.
        json: Option<String>,
    },
}

/// One feature row as read from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// Geometry blob; `None` for NULL or non-binary cells.
    pub geometry: Option<Vec<u8>>,
    /// Tag data.
    pub tags: FetchedTags,
}

impl RawFeature {
    /// Resolve the row's tags for `layer`.
    pub fn resolve_tags(&self, layer: &LayerDescriptor) -> Result<TagMapping, MalformedTagData> {
        match &self.tags {
            FetchedTags::Raw(row) => resolve_tags(layer, row),
            FetchedTags::Merged {
                merged: Some(merged),
                ..
            } => tags_from_merged_json(merged),
            FetchedTags::Merged { merged: None, json } => match json.as_deref() {
                Some(raw) => tags_from_merged_json(raw)
                    .and(Err(MalformedTagData::RejectedByStorage)),
                None => Err(MalformedTagData::RejectedByStorage),
            },
        }
    }
}

/// Read every feature row of `layer`.
pub fn read_layer(
    connection: &Connection,
    layer: &LayerDescriptor,
    mode: TagMergeMode,
) -> Result<Vec<RawFeature>, ReadError> {
    let query = FeatureQuery::for_layer(layer, mode);
    debug!("Layer {}: {}", layer.name, query.sql());

    let mut statement =
        connection
            .prepare(query.sql())
            .map_err(|source| ReadError::Prepare {
                layer: layer.name.clone(),
                source,
            })?;
    let mut rows = statement.query([]).map_err(|source| ReadError::Query {
        layer: layer.name.clone(),
        source,
    })?;

    let mut features = Vec::new();
    loop {
        let row = rows.next().map_err(|source| ReadError::Query {
            layer: layer.name.clone(),
            source,
        })?;
        let Some(row) = row else {
            break;
        };
        features.push(read_row(row, &query, &layer.name).map_err(|source| {
            ReadError::Query {
                layer: layer.name.clone(),
                source,
            }
        })?);
    }
    Ok(features)
}

fn read_row(row: &Row<'_>, query: &FeatureQuery, layer: &str) -> rusqlite::Result<RawFeature> {
    let geometry = match row.get_ref(0)? {
        ValueRef::Blob(bytes) => Some(bytes.to_vec()),
        _ => None,
    };

    let tags = match query.mode() {
        TagMergeMode::InProcess => {
            let mut raw = RawTagRow::default();
            for (offset, name) in query.tag_columns().iter().enumerate() {
                let value = cell_value(row.get_ref(offset + 1)?, layer, name);
                raw.columns.push((name.clone(), value));
            }
            if query.has_json_tags() {
                raw.json = text_cell(row.get_ref(query.tag_columns().len() + 1)?);
            }
            FetchedTags::Raw(raw)
        }
        TagMergeMode::Sqlite => FetchedTags::Merged {
            merged: text_cell(row.get_ref(1)?),
            json: if query.has_json_tags() {
                text_cell(row.get_ref(2)?)
            } else {
                None
            },
        },
    };
    Ok(RawFeature { geometry, tags })
}

/// Map a tag cell to a tag value. BLOB cells cannot be tags.
fn cell_value(value: ValueRef<'_>, layer: &str, column: &str) -> Option<TagValue> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(number) => Some(TagValue::Integer(number)),
        ValueRef::Real(number) => Some(TagValue::Float(number)),
        ValueRef::Text(text) => Some(TagValue::String(String::from_utf8_lossy(text).into_owned())),
        ValueRef::Blob(_) => {
            warn!(
                "Layer {}: dropped binary value in tag column {}",
                layer, column
            );
            None
        }
    }
}

fn text_cell(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(text) => Some(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Null | ValueRef::Integer(_) | ValueRef::Real(_) => None,
    }
}
