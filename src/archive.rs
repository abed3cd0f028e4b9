use crate::BuildError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::info;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a tar archive, gunzipping it when it starts with the gzip magic
fn open(tar_file: &Path) -> Result<Archive<Box<dyn Read>>, BuildError> {
    let read_error = |e| BuildError::io(format!("Failed to read {}", tar_file.display()), e);

    let mut file = File::open(tar_file).map_err(read_error)?;
    let mut magic = [0_u8; 2];
    let gzipped = file.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC;
    file.rewind().map_err(read_error)?;

    let reader: Box<dyn Read> = if gzipped { Box::new(GzDecoder::new(file)) } else { Box::new(file) };
    Ok(Archive::new(reader))
}

/// Top-level directory of the archive: the first component of its first entry
fn root_entry(tar_file: &Path) -> Result<Option<String>, BuildError> {
    let read_error = |e| BuildError::io(format!("Failed to read {}", tar_file.display()), e);

    let mut archive = open(tar_file)?;
    for entry in archive.entries().map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let path = entry.path().map_err(read_error)?;
        let root = path.components().find_map(|component| match component {
            Component::Normal(name) => name.to_str().map(str::to_string),
            _ => None,
        });
        if root.is_some() {
            return Ok(root);
        }
    }
    Ok(None)
}

/// Whether `path` is a readable tar archive, gzipped or not
pub fn is_tarball(path: &Path) -> bool {
    path.is_file() && root_entry(path).is_ok_and(|root| root.is_some())
}

/// Extract `tar_file` next to itself and return the extracted root directory
///
/// # Errors
///
/// Returns an error if:
/// - The archive cannot be read or is empty
/// - The destination already exists and `overwrite` is false
/// - An entry cannot be unpacked
pub fn extract_tar(tar_file: &Path, overwrite: bool) -> Result<PathBuf, BuildError> {
    let templates_dir = tar_file.parent().unwrap_or_else(|| Path::new("."));

    let root = root_entry(tar_file)?
        .ok_or_else(|| BuildError::Document(format!("{} is an empty archive", tar_file.display())))?;

    let destination = templates_dir.join(&root);
    if destination.is_dir() && !overwrite {
        return Err(BuildError::AlreadyExists(format!(
            "Can't extract {} as directory {} already exists",
            tar_file.display(),
            destination.display()
        )));
    }

    info!(target: "tar", "Extracting {} to {}", tar_file.display(), templates_dir.display());
    open(tar_file)?
        .unpack(templates_dir)
        .map_err(|e| BuildError::io(format!("Failed to extract {}", tar_file.display()), e))?;
    Ok(destination)
}
