use crate::document::{reader, ConfigDocument, ConfigValue};
use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// Environment variable that points at an alternative tool config file
pub const CONFIG_ENV: &str = "SDK_BUILDMANAGER_CONFIG";

/// Directory under the home directory holding the tool configuration
pub const CONFIG_DIR: &str = ".cenm_sdk";

/// Per-user tool configuration (`~/.cenm_sdk/config.yaml`)
///
/// Holds extra flags for the external commands, keyed by command and
/// subcommand path:
///
/// ```yaml
/// helm:
///   dependency:
///     update:
///       --skip-refresh:
///   package:
///     --app-version: 1.2.3
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    doc: ConfigDocument,
}

impl AppConfig {
    pub const fn from_document(doc: ConfigDocument) -> Self {
        Self { doc }
    }

    /// Load the tool configuration from the default path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Unable to determine the home directory
    /// - Unable to read the config file (other than it not existing)
    /// - The config file contains invalid YAML
    pub fn load() -> Result<Option<Self>> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load the tool configuration from `path`; a missing file yields `None`
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let doc = reader::load_yaml_mapping(path)
            .with_context(|| format!("Failed to load tool config at {}", path.display()))?;
        Ok(Some(Self { doc }))
    }

    /// Get the path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if unable to determine the home directory
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            Ok(PathBuf::from(path))
        } else if let Some(base_dirs) = BaseDirs::new() {
            Ok(base_dirs.home_dir().join(CONFIG_DIR).join("config.yaml"))
        } else {
            anyhow::bail!("Could not determine home directory")
        }
    }

    /// Extra flags for `command` followed by `path` (e.g. `helm`, `["lint"]`)
    ///
    /// Each entry of the mapping found at that location renders as
    /// `flag=value`, or as a bare `flag` when its value is empty.
    pub fn command_flags(&self, command: &str, path: &[&str]) -> Option<Vec<String>> {
        let mut node = self.doc.get_mapping(command)?;
        for key in path {
            node = node.get_mapping(key)?;
        }

        let flags: Vec<String> = node
            .iter()
            .map(|(name, value)| match value {
                ConfigValue::Scalar(scalar) if !value.is_null() => {
                    format!("{name}={}", scalar.to_plain_string())
                },
                _ => name.clone(),
            })
            .collect();

        if flags.is_empty() {
            None
        } else {
            Some(flags)
        }
    }
}
