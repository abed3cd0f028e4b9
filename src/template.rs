use crate::BuildError;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Replace every occurrence of `placeholder` in the file with `value`
///
/// A missing file is left alone; the chart templates do not all ship every
/// optional manifest.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or written.
pub fn replace_in_file(path: &Path, placeholder: &str, value: &str) -> Result<bool, BuildError> {
    if !path.exists() {
        return Ok(false);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| BuildError::io(format!("failed to read {}", path.display()), e))?;
    if !content.contains(placeholder) {
        return Ok(false);
    }

    fs::write(path, content.replace(placeholder, value))
        .map_err(|e| BuildError::io(format!("failed to write {}", path.display()), e))?;
    Ok(true)
}

/// Apply several placeholder substitutions to one file, in order
///
/// # Errors
///
/// See [`replace_in_file`].
pub fn replace_all_in_file(path: &Path, changes: &[(&str, &str)]) -> Result<(), BuildError> {
    for (placeholder, value) in changes {
        replace_in_file(path, placeholder, value)?;
    }
    Ok(())
}

/// Rewrite every `ARG <arg>=...` line of a Dockerfile to `ARG <arg>=<value>`
///
/// # Errors
///
/// Returns an error if the pattern for `arg` cannot be compiled.
pub fn replace_docker_arg(arg: &str, value: &str, dockerfile: &str) -> Result<String, BuildError> {
    let pattern = Regex::new(&format!(r"(?m)^(\s*ARG {}=).*$", regex::escape(arg)))
        .map_err(|e| BuildError::Config(format!("invalid Dockerfile ARG pattern for {arg}: {e}")))?;

    let replaced = pattern.replace_all(dockerfile, |caps: &regex::Captures<'_>| {
        let mut line = caps[1].to_string();
        line.push_str(value);
        line
    });
    Ok(replaced.into_owned())
}

/// Like [`replace_docker_arg`] but for a Dockerfile on disk
///
/// # Errors
///
/// Returns an error if the Dockerfile cannot be read or written.
pub fn set_docker_args(dockerfile: &Path, args: &[(&str, &str)]) -> Result<(), BuildError> {
    let mut content = fs::read_to_string(dockerfile)
        .map_err(|e| BuildError::io(format!("failed to read {}", dockerfile.display()), e))?;
    for (arg, value) in args {
        content = replace_docker_arg(arg, value, &content)?;
    }
    fs::write(dockerfile, content)
        .map_err(|e| BuildError::io(format!("failed to write {}", dockerfile.display()), e))
}
