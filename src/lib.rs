#![allow(missing_docs)]

pub mod app_config;
pub mod archive;
pub mod build_options;
pub mod chart;
pub mod cli;
pub mod csar;
pub mod docker;
pub mod document;
pub mod files;
pub mod logging;
pub mod merge;
pub mod pipeline;
pub mod process;
pub mod template;

pub use document::{ConfigDocument, ConfigValue, Scalar};
pub use merge::{merge, MergeError};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid document: {0}")]
    Document(String),

    #[error("Failed to parse {format} file {path}: {message}")]
    Parse { path: PathBuf, format: &'static str, message: String },

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Failed to merge {patch} into {base}: {source}")]
    MergeFailed {
        base: PathBuf,
        patch: PathBuf,
        #[source]
        source: MergeError,
    },

    #[error("No {option} for {component} found in {path}")]
    MissingBuildOption { component: String, option: &'static str, path: PathBuf },

    #[error("{0}")]
    AlreadyExists(String),

    #[error("File {0} not found")]
    NotFound(PathBuf),

    #[error("No rpm packages found in {0}")]
    NoPackages(PathBuf),

    /// `code` is -1 when the process was killed by a signal
    #[error("Command `{command}` failed with exit code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BuildError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }
}
