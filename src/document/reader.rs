use super::{ConfigDocument, ConfigValue, DocumentFormat, Json, Yaml};
use crate::BuildError;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read and parse a document in the given format
///
/// # Errors
///
/// Returns an error if:
/// - Unable to read the file
/// - Unable to parse the content
pub fn load<P: AsRef<Path>, F: DocumentFormat>(path: P, format: &F) -> Result<ConfigValue, BuildError> {
    let path_ref = path.as_ref();
    debug!(target: "yaml", "Loading {}", path_ref.display());

    let content = fs::read_to_string(path_ref)
        .map_err(|e| BuildError::io(format!("failed to read {}", path_ref.display()), e))?;

    format.parse(&content).map_err(|e| BuildError::Parse {
        path: path_ref.to_path_buf(),
        format: format.name(),
        message: e.to_string(),
    })
}

/// Read a YAML document
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid YAML.
pub fn load_yaml<P: AsRef<Path>>(path: P) -> Result<ConfigValue, BuildError> {
    load(path, &Yaml)
}

/// Read a JSON document
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid JSON.
pub fn load_json<P: AsRef<Path>>(path: P) -> Result<ConfigValue, BuildError> {
    load(path, &Json)
}

/// Read a YAML document whose top level must be a mapping
///
/// An empty file yields an empty mapping.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid YAML, or its
/// top level is a sequence or a non-null scalar.
pub fn load_yaml_mapping<P: AsRef<Path>>(path: P) -> Result<ConfigDocument, BuildError> {
    let path_ref = path.as_ref();
    match load_yaml(path_ref)? {
        ConfigValue::Mapping(doc) => Ok(doc),
        value if value.is_null() => Ok(ConfigDocument::new()),
        other => Err(BuildError::Parse {
            path: path_ref.to_path_buf(),
            format: Yaml.name(),
            message: format!("expected a mapping at the top level, found a {}", other.kind()),
        }),
    }
}
