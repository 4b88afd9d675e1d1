//! Entry point for the `gpkg2osm` binary.
#![forbid(unsafe_code)]

use env_logger::{Builder, Env};
use gpkg2osm_cli::CliError;

fn main() {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    match gpkg2osm_cli::run() {
        Ok(()) => {}
        // Help and version requests exit through clap with status 0.
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("gpkg2osm: {err}");
            std::process::exit(1);
        }
    }
}
