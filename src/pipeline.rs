use crate::app_config::AppConfig;
use crate::archive;
use crate::chart::{self, Helm};
use crate::csar::{self, Csar, RebuildRequest};
use crate::docker::{Docker, ModelsImage};
use crate::files;
use crate::logging::LogConfig;
use crate::process::CommandRunner;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Inputs of the chart and image build
#[derive(Debug, Clone)]
pub struct ChartRequest<'a> {
    /// SDK chart template, a directory or a `.tgz`
    pub sdk_path: &'a Path,
    /// One folder of inputs per custom chart
    pub sdk_input_path: &'a Path,
    pub repository: &'a str,
    /// Defaults to next to the template
    pub output_dir: Option<&'a Path>,
    pub overwrite: bool,
}

/// Inputs of a CSAR rebuild
#[derive(Debug, Clone)]
pub struct CsarRequest<'a> {
    pub chart_yaml: &'a Path,
    pub output_dir: &'a Path,
    /// Integration chart template (`.tgz`)
    pub integration_template: &'a Path,
    /// Folder holding `manifest/` and `vnfd/` descriptor templates
    pub descriptor_templates: &'a Path,
    pub product_set: &'a str,
    pub repository: &'a str,
    pub images_txt: &'a Path,
    pub light: bool,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Failed to resolve {}", path.display()))
}

/// Drives the chart, image and CSAR builds
pub struct SdkBuildManager<'a> {
    runner: &'a dyn CommandRunner,
    log: LogConfig,
    tool_config: Option<AppConfig>,
}

impl<'a> SdkBuildManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner, log: LogConfig, tool_config: Option<AppConfig>) -> Self {
        Self { runner, log, tool_config }
    }

    fn docker(&self) -> Docker<'_> {
        Docker::new(self.runner, self.log)
    }

    fn csar(&self) -> Csar<'_> {
        Csar::new(self.runner, self.docker(), self.tool_config.as_ref())
    }

    /// Build, push and package one custom chart per entry of the input folder
    ///
    /// Returns the packaged charts.
    ///
    /// # Errors
    ///
    /// Stops at the first chart that fails, with the chart named in the
    /// error context.
    pub fn generate_chart(&self, request: &ChartRequest<'_>) -> Result<Vec<PathBuf>> {
        let sdk_path = absolute(request.sdk_path)?;
        let sdk_input_path = absolute(request.sdk_input_path)?;
        let output_dir = request.output_dir.map(absolute).transpose()?;

        let templates_dir = if !sdk_path.is_dir() && archive::is_tarball(&sdk_path) {
            archive::extract_tar(&sdk_path, request.overwrite)
                .with_context(|| format!("Failed to extract SDK template {}", sdk_path.display()))?
        } else {
            sdk_path
        };

        let docker = self.docker();
        let helm = Helm::new(self.runner, self.tool_config.as_ref());
        let mut packages = Vec::new();

        for chart_name in files::entry_names(&sdk_input_path)? {
            info!(target: "sdk", "Building custom chart {chart_name}");
            let package = (|| -> Result<PathBuf> {
                let custom = chart::generate_custom_chart(
                    &templates_dir,
                    &chart_name,
                    &sdk_input_path,
                    output_dir.as_deref(),
                    request.overwrite,
                    request.repository,
                )?;
                chart::merge_custom_chart_config(&custom.dir, &chart_name, &sdk_input_path)?;

                docker.generate_images(&custom.dir, &sdk_input_path, request.repository)?;
                docker.generate_images_model(&custom.dir, &sdk_input_path, request.repository, ModelsImage::Install)?;
                docker.generate_images_model(&custom.dir, &sdk_input_path, request.repository, ModelsImage::Remove)?;

                let tags = docker.build_images(&custom.dir, request.repository, &sdk_input_path)?;
                docker.push_images(&tags)?;

                Ok(helm.package(&custom.dir, Some(&chart_name), Some(&sdk_input_path))?)
            })()
            .with_context(|| format!("Failed to build custom chart {chart_name}"))?;
            packages.push(package);
        }
        Ok(packages)
    }

    /// Load the images shipped with an SDK CSAR into `repository`
    ///
    /// # Errors
    ///
    /// Returns an error if `images_txt` is missing or a docker command fails.
    pub fn load_csar_images(&self, repository: &str, images_txt: &Path) -> Result<Vec<String>> {
        self.csar()
            .load_csar_images(repository, images_txt)
            .with_context(|| format!("Failed to load images listed in {}", images_txt.display()))
    }

    /// Build an integration CSAR from the user's `Chart.yaml`
    ///
    /// # Errors
    ///
    /// Returns an error if the package manager image is not listed or any
    /// build step fails.
    pub fn rebuild_csar(&self, request: &CsarRequest<'_>) -> Result<PathBuf> {
        let package_manager = csar::package_manager_image(request.images_txt, request.repository)
            .context("Failed to find the package manager image")?;
        info!(target: "sdk", "Using package manager {package_manager}");

        let output_dir = absolute(request.output_dir)?;
        let templates_dir = absolute(request.descriptor_templates)?;
        let rebuild = RebuildRequest {
            chart_yaml: request.chart_yaml,
            output_dir: &output_dir,
            template: request.integration_template,
            templates_dir: &templates_dir,
            product_set: request.product_set,
            package_manager: &package_manager,
            light: request.light,
        };
        self.csar()
            .rebuild_csar(&rebuild)
            .with_context(|| format!("Failed to rebuild CSAR from {}", request.chart_yaml.display()))
    }
}
