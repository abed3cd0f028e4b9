use crate::document::{reader, ConfigDocument};
use crate::BuildError;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CHART_VERSION: &str = "chart-version";
pub const CHART_DESCRIPTION: &str = "chart-description";
pub const IMAGE_VERSION: &str = "image-version";
pub const IMAGE_REPOSITORY: &str = "image-repository";
pub const SERVICE_NAME: &str = "servicename";

/// Directory holding the configuration patches of one chart
pub fn config_dir(sdk_input_path: &Path, chart_name: &str) -> PathBuf {
    sdk_input_path.join(chart_name).join("config")
}

/// Build options of one chart: `<input>/<chart>/config/build.yaml`
///
/// The document maps component names (the chart itself, its base image,
/// the monitoring sidecar, ...) to their options.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    path: PathBuf,
    doc: ConfigDocument,
}

impl BuildOptions {
    /// Load the build options of `chart_name`
    ///
    /// # Errors
    ///
    /// Returns an error if `build.yaml` is missing, unreadable or not a mapping.
    pub fn load(sdk_input_path: &Path, chart_name: &str) -> Result<Self, BuildError> {
        let path = config_dir(sdk_input_path, chart_name).join("build.yaml");
        debug!(target: "yaml", "Loading build options from {}", path.display());
        let doc = reader::load_yaml_mapping(&path)?;
        Ok(Self { path, doc })
    }

    pub const fn from_document(path: PathBuf, doc: ConfigDocument) -> Self {
        Self { path, doc }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.doc.get_mapping(name).is_some()
    }

    /// Options of one component, if present
    pub fn component<'a>(&'a self, name: &'a str) -> Option<ImageOptions<'a>> {
        self.doc.get_mapping(name).map(|doc| ImageOptions { component: name, path: &self.path, doc })
    }

    /// Options of one component
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingBuildOption`] if the component has no entry.
    pub fn require_component<'a>(&'a self, name: &'a str) -> Result<ImageOptions<'a>, BuildError> {
        self.component(name).ok_or_else(|| BuildError::MissingBuildOption {
            component: name.to_string(),
            option: "options",
            path: self.path.clone(),
        })
    }
}

/// Typed view over one component's entry in `build.yaml`
#[derive(Debug, Clone, Copy)]
pub struct ImageOptions<'a> {
    component: &'a str,
    path: &'a Path,
    doc: &'a ConfigDocument,
}

impl ImageOptions<'_> {
    pub fn get(&self, key: &str) -> Option<String> {
        self.doc.get_str(key).filter(|value| !value.is_empty())
    }

    /// Option `key`, failing with a diagnostic that names `build.yaml`
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingBuildOption`] if the key is absent or empty.
    pub fn require(&self, key: &'static str) -> Result<String, BuildError> {
        self.get(key).ok_or_else(|| BuildError::MissingBuildOption {
            component: self.component.to_string(),
            option: key,
            path: self.path.to_path_buf(),
        })
    }

    pub fn chart_version(&self) -> Option<String> {
        self.get(CHART_VERSION)
    }

    pub fn image_version(&self) -> Option<String> {
        self.get(IMAGE_VERSION)
    }

    pub fn image_repository(&self) -> Option<String> {
        self.get(IMAGE_REPOSITORY)
    }

    /// `chart-description`, defaulting to `Helm chart for <chart>`
    pub fn chart_description(&self, chart_name: &str) -> String {
        self.get(CHART_DESCRIPTION).unwrap_or_else(|| format!("Helm chart for {chart_name}"))
    }

    /// `servicename`, defaulting to the chart name
    pub fn service_name(&self, chart_name: &str) -> String {
        self.get(SERVICE_NAME).unwrap_or_else(|| chart_name.to_string())
    }
}
