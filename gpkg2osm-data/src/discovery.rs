//! Layer discovery from GeoPackage metadata tables.
//!
//! `gpkg_geometry_columns` names the spatial tables. `gpkg_data_columns`
//! marks which of their columns carry OSM tags: the `osm_tags` column with
//! mime type `application/json` is the free-form JSON field, and any other
//! column whose description mentions "osm tag" is a named tag column.

use std::collections::BTreeMap;

use gpkg2osm_core::{LayerDescriptor, LayerValidationError, OSM_TAGS_COLUMN};
use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, Row};
use thiserror::Error;

const JSON_MIME_TYPE: &str = "application/json";
const TAG_DESCRIPTION_MARKER: &str = "osm tag";

/// Errors raised while reading layer metadata.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// `gpkg_geometry_columns` could not be queried.
    #[error("failed to query gpkg_geometry_columns")]
    GeometryColumns {
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// `gpkg_data_columns` exists but could not be queried.
    #[error("failed to query gpkg_data_columns")]
    DataColumns {
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
}

/// A layer excluded by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLayer {
    /// Layer name.
    pub name: String,
    /// Why it was excluded.
    pub error: LayerValidationError,
}

/// Outcome of discovery: exportable layers and rejected ones, both ordered
/// by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerDiscovery {
    /// Layers that passed validation.
    pub layers: Vec<LayerDescriptor>,
    /// Layers that failed validation.
    pub rejected: Vec<RejectedLayer>,
}

/// Read and validate every layer described in the GeoPackage.
pub fn discover_layers(connection: &Connection) -> Result<LayerDiscovery, DiscoveryError> {
    let mut descriptors = read_geometry_columns(connection)?;
    read_data_columns(connection, &mut descriptors)?;

    let mut discovery = LayerDiscovery::default();
    for (name, descriptor) in descriptors {
        match descriptor.validate() {
            Ok(kind) => {
                debug!(
                    "Layer {}: {} with {} tag column(s), json tags: {}",
                    name,
                    kind,
                    descriptor.tag_columns.len(),
                    descriptor.has_json_tags
                );
                discovery.layers.push(descriptor);
            }
            Err(error) => {
                warn!(
                    "Skipping layer {} ({}): {}",
                    name,
                    error.reason_code(),
                    error
                );
                discovery.rejected.push(RejectedLayer { name, error });
            }
        }
    }
    info!(
        "Discovered {} exportable layer(s), {} rejected",
        discovery.layers.len(),
        discovery.rejected.len()
    );
    Ok(discovery)
}

fn read_geometry_columns(
    connection: &Connection,
) -> Result<BTreeMap<String, LayerDescriptor>, DiscoveryError> {
    let mut statement = connection
        .prepare(
            "SELECT table_name, column_name, geometry_type_name, srs_id, z, m \
             FROM gpkg_geometry_columns",
        )
        .map_err(|source| DiscoveryError::GeometryColumns { source })?;
    let rows = statement
        .query_map([], geometry_row)
        .map_err(|source| DiscoveryError::GeometryColumns { source })?;

    let mut descriptors = BTreeMap::new();
    for row in rows {
        let descriptor = match row {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!("Skipping unreadable gpkg_geometry_columns row: {}", err);
                continue;
            }
        };
        if descriptors.contains_key(&descriptor.name) {
            warn!(
                "Layer {} declares more than one geometry column; keeping the first",
                descriptor.name
            );
            continue;
        }
        descriptors.insert(descriptor.name.clone(), descriptor);
    }
    Ok(descriptors)
}

fn geometry_row(row: &Row<'_>) -> rusqlite::Result<LayerDescriptor> {
    let name: String = row.get(0)?;
    let column: String = row.get(1)?;
    let geometry_type: String = row.get(2)?;
    let srs_id: i32 = row.get(3)?;
    let z: i64 = row.get(4)?;
    let m: i64 = row.get(5)?;
    let mut descriptor = LayerDescriptor::new(name, column, geometry_type, srs_id);
    descriptor.has_z = z != 0;
    descriptor.has_m = m != 0;
    Ok(descriptor)
}

fn read_data_columns(
    connection: &Connection,
    descriptors: &mut BTreeMap<String, LayerDescriptor>,
) -> Result<(), DiscoveryError> {
    let exists = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'gpkg_data_columns'",
            [],
            |_| Ok(()),
        )
        .optional()
        .map_err(|source| DiscoveryError::DataColumns { source })?;
    if exists.is_none() {
        warn!("gpkg_data_columns is missing; no layer has tag columns");
        return Ok(());
    }

    let mut statement = connection
        .prepare("SELECT table_name, column_name, description, mime_type FROM gpkg_data_columns")
        .map_err(|source| DiscoveryError::DataColumns { source })?;
    let rows = statement
        .query_map([], |row| {
            Ok(DataColumn {
                table: row.get(0)?,
                column: row.get(1)?,
                description: row.get(2)?,
                mime_type: row.get(3)?,
            })
        })
        .map_err(|source| DiscoveryError::DataColumns { source })?;

    for row in rows {
        let data_column = match row {
            Ok(data_column) => data_column,
            Err(err) => {
                warn!("Skipping unreadable gpkg_data_columns row: {}", err);
                continue;
            }
        };
        let Some(descriptor) = descriptors.get_mut(&data_column.table) else {
            debug!(
                "Ignoring data column {}.{}: not a geometry layer",
                data_column.table, data_column.column
            );
            continue;
        };
        data_column.apply(descriptor);
    }
    Ok(())
}

struct DataColumn {
    table: String,
    column: String,
    description: Option<String>,
    mime_type: Option<String>,
}

impl DataColumn {
    fn apply(self, descriptor: &mut LayerDescriptor) {
        if self.column == OSM_TAGS_COLUMN && self.mime_type.as_deref() == Some(JSON_MIME_TYPE) {
            descriptor.has_json_tags = true;
        } else if self
            .description
            .is_some_and(|text| text.to_lowercase().contains(TAG_DESCRIPTION_MARKER))
        {
            descriptor.tag_columns.insert(self.column);
        }
    }
}
