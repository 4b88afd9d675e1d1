//! Behaviour-driven step definitions driving the convert CLI scenarios.

use super::helpers::{utf8_root, write_roads};
use super::*;
use crate::convert::run_convert;
use gpkg2osm_data::ConversionReport;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::{cell::RefCell, fs, path::PathBuf};
use tempfile::TempDir;

type Outcome = Result<Option<ConversionReport>, CliError>;

/// Holds one scenario's workspace, chosen paths and CLI result.
struct ConvertWorld {
    workspace: TempDir,
    input: RefCell<Option<Utf8PathBuf>>,
    output: RefCell<Option<Utf8PathBuf>>,
    stdout: RefCell<Vec<u8>>,
    outcome: RefCell<Option<Outcome>>,
}

impl ConvertWorld {
    fn new() -> Self {
        Self {
            workspace: TempDir::new().expect("create workspace"),
            input: RefCell::new(None),
            output: RefCell::new(None),
            stdout: RefCell::new(Vec::new()),
            outcome: RefCell::new(None),
        }
    }

    fn root(&self) -> Utf8PathBuf {
        utf8_root(&self.workspace)
    }

    fn with_outcome(&self, check: impl FnOnce(&Outcome)) {
        let borrowed = self.outcome.borrow();
        check(borrowed.as_ref().expect("command was run"));
    }

    fn report(&self) -> ConversionReport {
        let borrowed = self.outcome.borrow();
        match borrowed.as_ref().expect("command was run") {
            Ok(Some(report)) => report.clone(),
            Ok(None) => panic!("expected a conversion, found summary mode"),
            Err(err) => panic!("expected success, found {err:?}"),
        }
    }
}

#[fixture]
fn world() -> ConvertWorld {
    ConvertWorld::new()
}

#[given("a GeoPackage with one tagged road")]
fn one_road(#[from(world)] world: &ConvertWorld) {
    let path = write_roads(&world.root(), &[vec![(-3.19, 55.95), (-3.18, 55.95)]]);
    world.input.replace(Some(path));
}

#[given("a GeoPackage path that does not exist")]
fn missing_input(#[from(world)] world: &ConvertWorld) {
    world.input.replace(Some(world.root().join("absent.gpkg")));
}

#[when("I convert it with output {output}")]
fn convert_with_output(#[from(world)] world: &ConvertWorld, output: String) {
    let requested = output.trim_matches('"');
    let output = if requested == "-" {
        Utf8PathBuf::from(requested)
    } else {
        world.root().join(requested)
    };
    world.output.replace(Some(output.clone()));

    let input = world.input.borrow().clone().expect("input chosen");
    let invocation = [
        "gpkg2osm".to_owned(),
        "convert".to_owned(),
        format!("--{ARG_INPUT}"),
        input.into_string(),
        format!("--{ARG_OUTPUT}"),
        output.into_string(),
    ];
    let outcome = Cli::try_parse_from(invocation)
        .map_err(CliError::ArgumentParsing)
        .and_then(|cli| match cli.command {
            Command::Convert(args) => run_convert(args, &mut *world.stdout.borrow_mut()),
            Command::Inspect(_) => panic!("expected convert"),
        });
    world.outcome.replace(Some(outcome));
}

#[then("the output file holds {count} way")]
fn file_holds_ways(#[from(world)] world: &ConvertWorld, count: usize) {
    let output = world.output.borrow().clone().expect("output chosen");
    let xml = fs::read_to_string(&output).expect("output written");
    assert_eq!(xml.matches("<way ").count(), count);
}

#[then("the report counts {count} converted row")]
fn report_counts(#[from(world)] world: &ConvertWorld, count: usize) {
    let report = world.report();
    assert_eq!(report.rows_converted, count);
    assert_eq!(report.rows_skipped(), 0);
}

#[then("stdout holds an OSM document with {count} way")]
fn stdout_holds_document(#[from(world)] world: &ConvertWorld, count: usize) {
    assert_eq!(world.report().rows_converted, count);
    let stdout = world.stdout.borrow();
    let xml = String::from_utf8_lossy(&stdout);
    assert!(xml.contains("<osm version=\"0.6\""));
    assert_eq!(xml.matches("<way ").count(), count);
}

#[then("the output file is a PBF with {count} data blocks")]
fn file_is_pbf(#[from(world)] world: &ConvertWorld, count: usize) {
    let output = world.output.borrow().clone().expect("output chosen");
    let bytes = fs::read(&output).expect("output written");
    let (length, rest) = bytes.split_at(4);
    let length = u32::from_be_bytes(length.try_into().expect("four bytes"));
    let header = rest
        .get(..usize::try_from(length).expect("header length"))
        .expect("blob header present");
    assert!(header.windows(9).any(|window| window == b"OSMHeader"));
    assert_eq!(bytes.windows(7).filter(|window| *window == b"OSMData").count(), count);
    assert!(!bytes.windows(5).any(|window| window == b"<osm "));
}

#[then("the CLI reports an invalid output extension")]
fn reports_invalid_extension(#[from(world)] world: &ConvertWorld) {
    world.with_outcome(|outcome| match outcome {
        Err(CliError::InvalidOutputExtension { path }) => {
            assert!(path.as_str().ends_with("roads.geojson"));
        }
        other => panic!("unexpected outcome {other:?}"),
    });
}

#[then("the CLI reports that the \"input\" path is missing")]
fn reports_missing_input(#[from(world)] world: &ConvertWorld) {
    world.with_outcome(|outcome| match outcome {
        Err(CliError::MissingSourceFile { field, .. }) => assert_eq!(*field, ARG_INPUT),
        other => panic!("unexpected outcome {other:?}"),
    });
    let output = world.output.borrow().clone().expect("output chosen");
    assert!(!output.as_std_path().exists());
}

#[test]
fn scenario_indices_follow_feature_order() {
    let feature =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/features/convert_command.feature");
    let contents = fs::read_to_string(&feature).unwrap_or_else(|err| {
        panic!("failed to read feature file {feature:?}: {err}");
    });
    let titles: Vec<&str> = contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .collect();
    assert_eq!(
        titles,
        [
            "writing an OSM file into a new directory",
            "streaming the document to stdout",
            "rejecting an unsupported output extension",
            "rejecting a missing GeoPackage",
            "writing a PBF file chosen by suffix",
        ]
    );
}

#[scenario(path = "tests/features/convert_command.feature", index = 0)]
fn writing_into_new_directory(world: ConvertWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/convert_command.feature", index = 1)]
fn streaming_to_stdout(world: ConvertWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/convert_command.feature", index = 2)]
fn rejecting_unsupported_extension(world: ConvertWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/convert_command.feature", index = 3)]
fn rejecting_missing_geopackage(world: ConvertWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/convert_command.feature", index = 4)]
fn writing_pbf_by_suffix(world: ConvertWorld) {
    let _ = world;
}
