//! Convert command implementation for the gpkg2osm CLI.

use std::io::{BufWriter, Write};

use camino::Utf8PathBuf;
use clap::Parser;
use gpkg2osm_core::OsmGraph;
use gpkg2osm_data::{
    Conversion, ConversionReport, ConvertError, ConvertOptions, Converter, OsmSink, PbfSink,
    TagMergeMode, XmlSink,
};
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::paths::{self, OutputFormat, OutputTarget};
use crate::{ARG_INPUT, ARG_OUTPUT, ARG_TAG_MERGE, CliError, ENV_CONVERT_INPUT};

/// CLI arguments for the `convert` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Convert every exportable layer of a GeoPackage into one \
                 OSM document. The output suffix picks the format: .osm.pbf \
                 writes PBF, .osm or .osm.xml writes XML, and - streams XML \
                 to stdout. Without --output the layers are only summarised. \
                 Paths can come from CLI flags, configuration files, or \
                 environment variables.",
    about = "Convert a GeoPackage into OSM PBF or XML"
)]
#[ortho_config(prefix = "GPKG2OSM")]
pub(crate) struct ConvertArgs {
    /// Path to the GeoPackage.
    #[arg(short = 'i', long = ARG_INPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Destination `.osm.pbf`, `.osm` or `.osm.xml` file, or `-` for stdout.
    #[arg(short = 'o', long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Where tag columns and the JSON field are merged: `in-process` or `sqlite`.
    #[arg(long = ARG_TAG_MERGE, value_name = "mode")]
    #[serde(default)]
    pub(crate) tag_merge: Option<TagMergeMode>,
}

impl ConvertArgs {
    pub(crate) fn into_config(self) -> Result<ConvertConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ConvertConfig::try_from(merged)
    }
}

/// Resolved `convert` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConvertConfig {
    pub(crate) input: Utf8PathBuf,
    /// `None` selects summary mode.
    pub(crate) output: Option<OutputTarget>,
    pub(crate) tag_merge: TagMergeMode,
}

impl TryFrom<ConvertArgs> for ConvertConfig {
    type Error = CliError;

    fn try_from(args: ConvertArgs) -> Result<Self, Self::Error> {
        let input = crate::required_input(args.input, ENV_CONVERT_INPUT)?;
        let output = args.output.map(OutputTarget::parse).transpose()?;
        Ok(Self {
            input,
            output,
            tag_merge: args.tag_merge.unwrap_or_default(),
        })
    }
}

/// Resolve `args`, convert, and write the document to its target.
///
/// Returns `None` in summary mode. `stdout` receives the document when the
/// output is `-`.
pub(crate) fn run_convert(
    args: ConvertArgs,
    stdout: &mut dyn Write,
) -> Result<Option<ConversionReport>, CliError> {
    let config = args.into_config()?;
    paths::require_file(&config.input, ARG_INPUT)?;
    execute(&config, stdout)
}

pub(crate) fn execute(
    config: &ConvertConfig,
    stdout: &mut dyn Write,
) -> Result<Option<ConversionReport>, CliError> {
    let connection = crate::open_geopackage(&config.input)?;
    let discovery = crate::summarise(&connection)?;
    let Some(target) = &config.output else {
        info!("No output requested; {} layer(s) would be exported", discovery.layers.len());
        return Ok(None);
    };

    let converter = Converter::new(ConvertOptions {
        tag_merge: config.tag_merge,
    });
    match converter.convert(&connection, &discovery.layers) {
        Ok(conversion) => {
            write_document(target, &conversion.graph, stdout)?;
            log_report(&conversion);
            Ok(Some(conversion.report))
        }
        Err(ConvertError::Synthesis {
            layer,
            source,
            partial,
        }) => {
            warn!(
                "Writing partial output: {} node(s), {} way(s), {} relation(s)",
                partial.graph.nodes().len(),
                partial.graph.ways().len(),
                partial.graph.relations().len()
            );
            write_document(target, &partial.graph, stdout)?;
            Err(CliError::Synthesis { layer, source })
        }
    }
}

fn write_document(
    target: &OutputTarget,
    graph: &OsmGraph,
    stdout: &mut dyn Write,
) -> Result<(), CliError> {
    let (path, format) = match target {
        OutputTarget::Stdout => {
            XmlSink::new(stdout).write_graph(graph)?;
            return Ok(());
        }
        OutputTarget::File { path, format } => (path, format),
    };
    let file = paths::create_output_file(path).map_err(|source| CliError::CreateOutput {
        path: path.clone(),
        source,
    })?;
    let writer = BufWriter::new(file);
    match format {
        OutputFormat::Xml => XmlSink::new(writer).write_graph(graph)?,
        OutputFormat::Pbf => PbfSink::new(writer).write_graph(graph)?,
    }
    info!("Wrote {path}");
    Ok(())
}

fn log_report(conversion: &Conversion) {
    let report = &conversion.report;
    info!(
        "{} layer(s) converted, {} failed; {} row(s) skipped",
        report.layers_converted,
        report.layers_failed,
        report.rows_skipped()
    );
    for (reason, count) in &report.skipped {
        info!("  {reason}: {count}");
    }
}
