use super::{ConfigValue, DocumentFormat, Yaml};
use crate::BuildError;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Serialize `value` and overwrite `path` with it
///
/// The document is written to a temporary file next to `path` and renamed
/// over it, so a failed write never leaves a truncated template behind.
///
/// # Errors
///
/// Returns an error if:
/// - Unable to create parent directories
/// - Unable to serialize the document
/// - Unable to write or rename the file
pub fn dump<P: AsRef<Path>, F: DocumentFormat>(
    path: P,
    value: &ConfigValue,
    format: &F,
) -> Result<(), BuildError> {
    let path_ref = path.as_ref();
    debug!(target: "yaml", "Writing {}", path_ref.display());

    let parent = match path_ref.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|e| BuildError::io(format!("failed to create {}", parent.display()), e))?;

    let text = format.render(value)?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| BuildError::io(format!("failed to create temp file in {}", parent.display()), e))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| BuildError::io(format!("failed to write {}", path_ref.display()), e))?;
    tmp.persist(path_ref)
        .map_err(|e| BuildError::io(format!("failed to replace {}", path_ref.display()), e.error))?;

    Ok(())
}

/// Write a YAML document
///
/// # Errors
///
/// See [`dump`].
pub fn dump_yaml<P: AsRef<Path>>(path: P, value: &ConfigValue) -> Result<(), BuildError> {
    dump(path, value, &Yaml)
}
