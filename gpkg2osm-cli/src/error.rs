//! Error types emitted by the gpkg2osm CLI.
//!
//! Many helpers return `Result<_, CliError>`, so variants hold boxed or
//! small payloads only.

use std::sync::Arc;

use camino::Utf8PathBuf;
use gpkg2osm_core::SynthesisError;
use gpkg2osm_data::{DiscoveryError, PbfSinkError, XmlSinkError};
use thiserror::Error;

/// Errors emitted by the gpkg2osm CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name without leading dashes.
        field: &'static str,
        /// Environment variable that can supply the value.
        env: &'static str,
    },
    /// A referenced input path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag that named the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag that named the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag that named the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The output path does not name an OSM XML or PBF file.
    #[error("output path {path:?} must end in .osm, .osm.xml or .osm.pbf (or be - for stdout)")]
    InvalidOutputExtension {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// SQLite refused to open the GeoPackage.
    #[error("failed to open GeoPackage {path:?}: {source}")]
    OpenGeoPackage {
        /// Input path.
        path: Utf8PathBuf,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },
    /// Layer metadata could not be read.
    #[error("failed to discover layers: {0}")]
    Discovery(#[from] DiscoveryError),
    /// Conversion stopped on a run-wide error. The partial output was
    /// written before this was returned.
    #[error("conversion aborted in layer {layer}: {source}")]
    Synthesis {
        /// Layer being converted when the run stopped.
        layer: String,
        /// Underlying synthesis error.
        #[source]
        source: SynthesisError,
    },
    /// The output file or its parent directory could not be created.
    #[error("failed to create output {path:?}: {source}")]
    CreateOutput {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Writing the OSM XML document failed.
    #[error("failed to write OSM XML: {0}")]
    WriteXml(#[from] XmlSinkError),
    /// Writing the OSM PBF file failed.
    #[error("failed to write OSM PBF: {0}")]
    WritePbf(#[from] PbfSinkError),
}
