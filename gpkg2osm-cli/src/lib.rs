//! Command-line interface for converting GeoPackages into OSM PBF or XML.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use gpkg2osm_core::LayerDescriptor;
use gpkg2osm_data::{LayerDiscovery, discover_layers};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};

mod convert;
mod error;
mod paths;

pub use error::CliError;

use convert::{ConvertArgs, run_convert};

const ARG_INPUT: &str = "input";
const ARG_OUTPUT: &str = "output";
const ARG_TAG_MERGE: &str = "tag-merge";
const ENV_CONVERT_INPUT: &str = "GPKG2OSM_CMDS_CONVERT_INPUT";
const ENV_INSPECT_INPUT: &str = "GPKG2OSM_CMDS_INSPECT_INPUT";

/// Run the gpkg2osm CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Convert(args) => {
            let mut stdout = std::io::stdout().lock();
            run_convert(args, &mut stdout).map(drop)
        }
        Command::Inspect(args) => run_inspect(args).map(drop),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "gpkg2osm",
    about = "Convert tagged GeoPackage layers into OpenStreetMap PBF or XML",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert every exportable layer into one OSM document.
    Convert(ConvertArgs),
    /// Summarise the exportable layers without converting.
    Inspect(InspectArgs),
}

/// CLI arguments for the `inspect` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "List the layers a conversion would export")]
#[ortho_config(prefix = "GPKG2OSM")]
struct InspectArgs {
    /// Path to the GeoPackage.
    #[arg(short = 'i', long = ARG_INPUT, value_name = "path")]
    #[serde(default)]
    input: Option<Utf8PathBuf>,
}

impl InspectArgs {
    fn into_input(self) -> Result<Utf8PathBuf, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        let input = required_input(merged.input, ENV_INSPECT_INPUT)?;
        paths::require_file(&input, ARG_INPUT)?;
        Ok(input)
    }
}

fn required_input(
    input: Option<Utf8PathBuf>,
    env: &'static str,
) -> Result<Utf8PathBuf, CliError> {
    input.ok_or(CliError::MissingArgument {
        field: ARG_INPUT,
        env,
    })
}

fn run_inspect(args: InspectArgs) -> Result<LayerDiscovery, CliError> {
    let input = args.into_input()?;
    let connection = open_geopackage(&input)?;
    summarise(&connection)
}

/// Open `path` read-only.
fn open_geopackage(path: &Utf8Path) -> Result<Connection, CliError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    Connection::open_with_flags(path.as_std_path(), flags).map_err(|source| {
        CliError::OpenGeoPackage {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Discover layers and log one line per exportable layer.
fn summarise(connection: &Connection) -> Result<LayerDiscovery, CliError> {
    let discovery = discover_layers(connection)?;
    for layer in &discovery.layers {
        info!("{}", describe_layer(layer));
    }
    Ok(discovery)
}

fn describe_layer(layer: &LayerDescriptor) -> String {
    let kind = layer
        .geometry_kind()
        .map_or_else(|_| layer.geometry_type.clone(), |kind| kind.to_string());
    let mut sources: Vec<&str> = layer.tag_columns.iter().map(String::as_str).collect();
    if layer.has_json_tags {
        sources.push("osm_tags (json)");
    }
    format!("{}: {} [{}]", layer.name, kind, sources.join(", "))
}

#[cfg(test)]
mod tests;
