//! Tag resolution for feature rows.
//!
//! A row's tags come from two places: the layer's named tag columns and the
//! optional `osm_tags` JSON object. The JSON object is applied on top of the
//! named columns as a structural merge patch: keys it names replace the
//! column values wholesale and a JSON `null` deletes the key. Null cells
//! never produce tags.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::layer::LayerDescriptor;

/// A scalar tag value as read from a cell or a JSON object entry.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// Text value.
    String(String),
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean value; only reachable through JSON.
    Bool(bool),
}

impl TagValue {
    /// Render the value as an OSM tag value.
    ///
    /// Booleans follow the OSM `yes`/`no` convention.
    #[must_use]
    pub fn to_osm_value(&self) -> String {
        match self {
            Self::String(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Bool(true) => "yes".to_owned(),
            Self::Bool(false) => "no".to_owned(),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_osm_value())
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Flat key/value tags resolved for one feature row.
pub type TagMapping = BTreeMap<String, TagValue>;

/// OSM tags as written to the output: string keys and string values.
pub type OsmTags = BTreeMap<String, String>;

/// Convert resolved tags into their OSM string form.
pub fn to_osm_tags(mapping: &TagMapping) -> OsmTags {
    mapping
        .iter()
        .map(|(key, value)| (key.clone(), value.to_osm_value()))
        .collect()
}

/// Errors raised when the JSON tag field cannot be used.
#[derive(Debug, Error)]
pub enum MalformedTagData {
    /// The field is not valid JSON.
    #[error("tag field is not valid JSON: {source}")]
    InvalidJson {
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// The field is valid JSON but not an object.
    #[error("tag field must be a JSON object, found {found}")]
    NotAnObject {
        /// JSON type that was found instead.
        found: &'static str,
    },
    /// An entry holds an array or object instead of a scalar.
    #[error("tag {key:?} must be a scalar, found {found}")]
    NonScalarValue {
        /// Offending key.
        key: String,
        /// JSON type that was found instead.
        found: &'static str,
    },
    /// The storage layer refused to merge the field.
    #[error("tag field rejected by the storage-side JSON merge")]
    RejectedByStorage,
}

impl MalformedTagData {
    /// Stable code used in diagnostics.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        "malformed_tag_data"
    }
}

/// Raw tag data fetched for one row before merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTagRow {
    /// Named tag columns and their cell values; `None` is SQL `NULL`.
    pub columns: Vec<(String, Option<TagValue>)>,
    /// Text of the JSON tag field, if the layer has one and the cell is set.
    pub json: Option<String>,
}

impl RawTagRow {
    /// Append a named column value.
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, value: Option<TagValue>) -> Self {
        self.columns.push((name.into(), value));
        self
    }

    /// Set the JSON tag field text.
    #[must_use]
    pub fn with_json(mut self, json: impl Into<String>) -> Self {
        self.json = Some(json.into());
        self
    }
}

/// Merge a row's named columns and JSON tag field into one mapping.
///
/// Named columns not declared on the layer are ignored, as is a JSON field on
/// a layer that does not declare one.
///
/// # Examples
/// ```
/// use gpkg2osm_core::{LayerDescriptor, RawTagRow, TagValue, resolve_tags};
///
/// let layer = LayerDescriptor::new("l", "geom", "POINT", 4326)
///     .with_tag_column("a")
///     .with_tag_column("b")
///     .with_json_tags(true);
/// let row = RawTagRow::default()
///     .with_column("a", Some(TagValue::Integer(1)))
///     .with_column("b", Some(TagValue::Integer(2)))
///     .with_json(r#"{"b": null, "c": 3}"#);
///
/// let tags = resolve_tags(&layer, &row).expect("valid tags");
/// assert_eq!(tags.get("a"), Some(&TagValue::Integer(1)));
/// assert_eq!(tags.get("b"), None);
/// assert_eq!(tags.get("c"), Some(&TagValue::Integer(3)));
/// ```
pub fn resolve_tags(
    layer: &LayerDescriptor,
    row: &RawTagRow,
) -> Result<TagMapping, MalformedTagData> {
    let mut mapping: TagMapping = row
        .columns
        .iter()
        .filter(|(name, _)| layer.tag_columns.contains(name))
        .filter_map(|(name, value)| value.clone().map(|value| (name.clone(), value)))
        .collect();

    if !layer.has_json_tags {
        return Ok(mapping);
    }
    let Some(json) = row.json.as_deref() else {
        return Ok(mapping);
    };

    for (key, value) in parse_object(json)? {
        match scalar(&key, value)? {
            Some(value) => {
                mapping.insert(key, value);
            }
            None => {
                mapping.remove(&key);
            }
        }
    }
    Ok(mapping)
}

/// Parse tags that were already merged by the storage layer.
///
/// Null entries are dropped; everything else must be a scalar.
pub fn tags_from_merged_json(json: &str) -> Result<TagMapping, MalformedTagData> {
    let mut mapping = TagMapping::new();
    for (key, value) in parse_object(json)? {
        if let Some(value) = scalar(&key, value)? {
            mapping.insert(key, value);
        }
    }
    Ok(mapping)
}

fn parse_object(json: &str) -> Result<Map<String, Value>, MalformedTagData> {
    let value: Value =
        serde_json::from_str(json).map_err(|source| MalformedTagData::InvalidJson { source })?;
    match value {
        Value::Object(object) => Ok(object),
        other => Err(MalformedTagData::NotAnObject {
            found: json_type(&other),
        }),
    }
}

fn scalar(key: &str, value: Value) -> Result<Option<TagValue>, MalformedTagData> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(flag) => Ok(Some(TagValue::Bool(flag))),
        Value::String(text) => Ok(Some(TagValue::String(text))),
        Value::Number(number) => Ok(number
            .as_i64()
            .map(TagValue::Integer)
            .or_else(|| number.as_f64().map(TagValue::Float))),
        other @ (Value::Array(_) | Value::Object(_)) => Err(MalformedTagData::NonScalarValue {
            key: key.to_owned(),
            found: json_type(&other),
        }),
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
