//! Conversion driver: layers in, one OSM graph out.

use std::collections::BTreeMap;

use gpkg2osm_core::{
    EntitySynthesizer, Feature, LayerDescriptor, MalformedTagData, OsmGraph, SynthesisError,
    SynthesisOutcome,
};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use thiserror::Error;

use crate::blob::{GeometryDecodeError, decode_gpkg_geometry, parse_header};
use crate::query::TagMergeMode;
use crate::reader::{RawFeature, read_layer};

/// Options for a conversion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Where the tag merge runs.
    pub tag_merge: TagMergeMode,
}

/// Counters describing a conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Layers whose rows were all read.
    pub layers_converted: usize,
    /// Layers whose query failed.
    pub layers_failed: usize,
    /// Layers excluded by validation.
    pub layers_rejected: usize,
    /// Rows fetched.
    pub rows_read: usize,
    /// Rows that produced at least one primitive.
    pub rows_converted: usize,
    /// Rows skipped, keyed by reason code.
    pub skipped: BTreeMap<&'static str, usize>,
}

impl ConversionReport {
    /// Total number of skipped rows.
    #[must_use]
    pub fn rows_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Skipped rows for one reason code.
    #[must_use]
    pub fn skipped_for(&self, reason: &str) -> usize {
        self.skipped.get(reason).copied().unwrap_or_default()
    }

    fn skip(&mut self, reason: &'static str) {
        *self.skipped.entry(reason).or_default() += 1;
    }
}

/// Result of a conversion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversion {
    /// Everything synthesized.
    pub graph: OsmGraph,
    /// Run counters.
    pub report: ConversionReport,
}

/// Fatal conversion errors.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Synthesis hit a run-wide invariant violation.
    #[error("conversion aborted in layer {layer}")]
    Synthesis {
        /// Layer being converted when the run stopped.
        layer: String,
        /// Underlying synthesis error.
        #[source]
        source: SynthesisError,
        /// Primitives produced before the failure.
        partial: Box<Conversion>,
    },
}

impl ConvertError {
    /// Take the partial conversion produced before the failure.
    #[must_use]
    pub fn into_partial(self) -> Conversion {
        match self {
            Self::Synthesis { partial, .. } => *partial,
        }
    }
}

/// Why a single row was skipped before synthesis.
#[derive(Debug, Error)]
pub enum RowError {
    /// The geometry cell is NULL or not a blob.
    #[error("row has no geometry")]
    MissingGeometry,
    /// The geometry blob failed to decode.
    #[error(transparent)]
    Geometry(#[from] GeometryDecodeError),
    /// The tag data is unusable.
    #[error(transparent)]
    Tags(#[from] MalformedTagData),
}

impl RowError {
    /// Stable code used in diagnostics.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::MissingGeometry => "missing_geometry",
            Self::Geometry(err) => err.reason_code(),
            Self::Tags(err) => err.reason_code(),
        }
    }
}

/// Drives discovery output through reading, decoding and synthesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    /// Create a converter.
    pub const fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    /// Convert `layers` in order into one graph.
    ///
    /// Per-row and per-layer problems are logged and counted. Only a
    /// synthesis error stops the run; it carries the partial result.
    pub fn convert(
        &self,
        connection: &Connection,
        layers: &[LayerDescriptor],
    ) -> Result<Conversion, ConvertError> {
        let mut synthesizer = EntitySynthesizer::new();
        let mut report = ConversionReport::default();

        for layer in layers {
            if let Err(err) = layer.validate() {
                warn!("Skipping layer {} ({}): {}", layer.name, err.reason_code(), err);
                report.layers_rejected += 1;
                continue;
            }
            let rows = match read_layer(connection, layer, self.options.tag_merge) {
                Ok(rows) => rows,
                Err(err) => {
                    error!("Layer {} failed: {}", layer.name, describe(&err));
                    report.layers_failed += 1;
                    continue;
                }
            };
            debug!("Layer {}: {} row(s)", layer.name, rows.len());

            for raw in rows {
                report.rows_read += 1;
                let feature = match prepare(layer, &raw) {
                    Ok(feature) => feature,
                    Err(err) => {
                        warn!("Layer {}: skipped row ({}): {}", layer.name, err.reason_code(), err);
                        report.skip(err.reason_code());
                        continue;
                    }
                };
                match synthesizer.synthesize(&feature) {
                    Ok(SynthesisOutcome::Emitted(_)) => report.rows_converted += 1,
                    Ok(SynthesisOutcome::Skipped(reason)) => {
                        warn!("Layer {}: skipped row ({})", layer.name, reason);
                        report.skip(reason.reason_code());
                    }
                    Err(source) => {
                        error!("Layer {}: {}", layer.name, source);
                        let partial = Conversion {
                            graph: synthesizer.into_graph(),
                            report,
                        };
                        return Err(ConvertError::Synthesis {
                            layer: layer.name.clone(),
                            source,
                            partial: Box::new(partial),
                        });
                    }
                }
            }
            report.layers_converted += 1;
        }

        let graph = synthesizer.into_graph();
        info!(
            "Converted {} of {} row(s) into {} node(s), {} way(s), {} relation(s)",
            report.rows_converted,
            report.rows_read,
            graph.nodes().len(),
            graph.ways().len(),
            graph.relations().len()
        );
        Ok(Conversion { graph, report })
    }
}

fn prepare<'a>(layer: &'a LayerDescriptor, raw: &RawFeature) -> Result<Feature<'a>, RowError> {
    let blob = raw.geometry.as_deref().ok_or(RowError::MissingGeometry)?;
    if let Ok(header) = parse_header(blob)
        && header.srs_id != layer.srs_id
    {
        debug!(
            "Layer {}: blob SRS {} differs from layer SRS {}",
            layer.name, header.srs_id, layer.srs_id
        );
    }
    let geometry = decode_gpkg_geometry(blob)?;
    let tags = raw.resolve_tags(layer)?;
    Ok(Feature::new(layer, tags, geometry))
}

fn describe(err: &dyn std::error::Error) -> String {
    match err.source() {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}
