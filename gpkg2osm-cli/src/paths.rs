//! Capability-scoped filesystem access for input checks and output files.

use std::io;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

use crate::CliError;

/// Output path meaning "write to standard output".
pub(crate) const STDOUT_MARKER: &str = "-";

const OUTPUT_SUFFIXES: [(&str, OutputFormat); 3] = [
    (".osm", OutputFormat::Xml),
    (".osm.xml", OutputFormat::Xml),
    (".pbf", OutputFormat::Pbf),
];

/// Encoding of the OSM document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Xml,
    Pbf,
}

/// Where the OSM document is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutputTarget {
    /// Standard output, always as XML.
    Stdout,
    /// A file whose suffix picked the format.
    File {
        path: Utf8PathBuf,
        format: OutputFormat,
    },
}

impl OutputTarget {
    /// Interpret an `--output` value. Suffixes match case-insensitively.
    pub(crate) fn parse(path: Utf8PathBuf) -> Result<Self, CliError> {
        if path.as_str() == STDOUT_MARKER {
            return Ok(Self::Stdout);
        }
        let name = path.file_name().map(str::to_ascii_lowercase);
        let format = name.and_then(|name| {
            OUTPUT_SUFFIXES
                .iter()
                .find(|(suffix, _)| name.len() > suffix.len() && name.ends_with(suffix))
                .map(|(_, format)| *format)
        });
        match format {
            Some(format) => Ok(Self::File { path, format }),
            None => Err(CliError::InvalidOutputExtension { path }),
        }
    }
}

/// Check that `path` names an existing regular file.
pub(crate) fn require_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn is_file(path: &Utf8Path) -> io::Result<bool> {
    let name = file_name(path)?;
    let dir = fs_utf8::Dir::open_ambient_dir(parent_or_current(path), ambient_authority())?;
    dir.metadata(name).map(|meta| meta.is_file())
}

/// Create or truncate `path`, creating missing parent directories first.
pub(crate) fn create_output_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    let name = file_name(path)?;
    let (base, relative) = split_base(parent_or_current(path));
    let base_dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    if relative.as_str().is_empty() {
        return base_dir.create(name);
    }
    base_dir.create_dir_all(&relative)?;
    base_dir.open_dir(&relative)?.create(name)
}

fn file_name(path: &Utf8Path) -> io::Result<&str> {
    path.file_name()
        .ok_or_else(|| io::Error::other(format!("{path} does not name a file")))
}

fn parent_or_current(path: &Utf8Path) -> &Utf8Path {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

/// Split `dir` into an ambient base (root, prefix or leading `..`) and the
/// part cap-std may create beneath it.
fn split_base(dir: &Utf8Path) -> (Utf8PathBuf, Utf8PathBuf) {
    let mut base = Utf8PathBuf::new();
    let mut relative = Utf8PathBuf::new();
    for component in dir.components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir => base.push(component.as_str()),
            Utf8Component::ParentDir if relative.as_str().is_empty() => {
                base.push(component.as_str());
            }
            Utf8Component::CurDir => {}
            other => relative.push(other.as_str()),
        }
    }
    if base.as_str().is_empty() {
        base.push(".");
    }
    (base, relative)
}
