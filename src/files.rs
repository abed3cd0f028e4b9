use crate::BuildError;
use std::fs;
use std::path::{Path, PathBuf};

/// Copy `source` into `target`, recursing into subdirectories
///
/// # Errors
///
/// Returns an error if a directory cannot be created or read, or a file
/// cannot be copied.
pub fn copy_dir_recursive(source: &Path, target: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(target)
        .map_err(|e| BuildError::io(format!("Failed to create directory: {}", target.display()), e))?;

    for path in entries(source)? {
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target_path = target.join(file_name);

        if path.is_dir() {
            copy_dir_recursive(&path, &target_path)?;
        } else if path.is_file() {
            copy_file(&path, &target_path)?;
        }
    }

    Ok(())
}

/// Copy one file, naming both ends in the error
///
/// # Errors
///
/// Returns an error if the copy fails.
pub fn copy_file(source: &Path, target: &Path) -> Result<(), BuildError> {
    fs::copy(source, target).map(|_| ()).map_err(|e| {
        BuildError::io(
            format!("Failed to copy file from {} to {}", source.display(), target.display()),
            e,
        )
    })
}

/// Copy every regular file directly under `source` into the `target` directory
///
/// # Errors
///
/// Returns an error if `source` cannot be read or a file cannot be copied.
pub fn copy_files(source: &Path, target: &Path) -> Result<Vec<PathBuf>, BuildError> {
    fs::create_dir_all(target)
        .map_err(|e| BuildError::io(format!("Failed to create directory: {}", target.display()), e))?;

    let mut copied = Vec::new();
    for path in entries(source)? {
        if let (true, Some(name)) = (path.is_file(), path.file_name()) {
            let target_path = target.join(name);
            copy_file(&path, &target_path)?;
            copied.push(target_path);
        }
    }
    Ok(copied)
}

/// Rename `from` to `to`, naming both in the error
///
/// # Errors
///
/// Returns an error if the rename fails.
pub fn rename(from: &Path, to: &Path) -> Result<(), BuildError> {
    fs::rename(from, to).map_err(|e| {
        BuildError::io(format!("Failed to rename {} to {}", from.display(), to.display()), e)
    })
}

/// Entries of a directory, sorted by path
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn entries(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let read = fs::read_dir(dir)
        .map_err(|e| BuildError::io(format!("Failed to read directory: {}", dir.display()), e))?;

    let mut paths = Vec::new();
    for entry in read {
        let entry = entry
            .map_err(|e| BuildError::io(format!("Failed to read directory: {}", dir.display()), e))?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

/// Names of the entries of a directory, sorted
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn entry_names(dir: &Path) -> Result<Vec<String>, BuildError> {
    Ok(entries(dir)?
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect())
}

/// File name of `path` as UTF-8, or an error naming the path
///
/// # Errors
///
/// Returns [`BuildError::Config`] if the path has no UTF-8 file name.
pub fn file_name(path: &Path) -> Result<String, BuildError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| BuildError::Config(format!("{} has no usable file name", path.display())))
}
