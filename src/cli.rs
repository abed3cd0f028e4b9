use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;

/// Environment variable supplying `--repository-url`
pub const REPOSITORY_ENV: &str = "SDK_REPOSITORY_URL";

#[derive(Parser, Debug)]
#[command(
    name = "sdk-buildmanager",
    about = "Build custom SDK charts, images and integration CSARs",
    long_about = "sdk-buildmanager turns SDK chart templates and per-chart inputs into
custom Helm charts and container images, and bundles charts into CSARs.

Flows run in this order when combined:
  1. --load-csar-images: load docker.tar next to images.txt and push to a registry
  2. --build-load-images: generate, build, push and package custom charts
  3. --rebuild-csar: package an integration chart and build a CSAR from it

--repository-url rewrites image tags:
  host-b           host-a/path/image:1 -> host-b/path/image:1
  host-b/internal  host-a/path/image:1 -> host-b/internal/image:1

Extra flags for helm can be set in ~/.cenm_sdk/config.yaml
(or the file named by SDK_BUILDMANAGER_CONFIG).",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Show debug messages and the output of quiet commands
    #[arg(long)]
    pub verbose: bool,

    /// Show all log messages including TRACE
    #[arg(long)]
    pub trace: bool,

    /// Docker registry to push to, as `host` or `host/path`
    #[arg(long, env = REPOSITORY_ENV)]
    pub repository_url: Option<String>,

    /// Overwrite charts and extracted templates that already exist
    #[arg(short = 'd')]
    pub overwrite: bool,

    /// Load the SDK CSAR images and push them to the repository
    #[arg(long)]
    pub load_csar_images: bool,

    /// Path to the SDK images.txt
    #[arg(short = 'i', value_name = "IMAGES_TXT", default_value = "docker/images.txt", value_hint = clap::ValueHint::FilePath)]
    pub sdk_images: PathBuf,

    /// Generate, build and push custom charts and their images
    #[arg(long)]
    pub build_load_images: bool,

    /// SDK chart template, a directory or a .tgz
    #[arg(long, value_hint = clap::ValueHint::AnyPath)]
    pub sdk_path: Option<PathBuf>,

    /// SDK integration chart template
    #[arg(
        long,
        default_value = "templates/charts/eric-enm-sdk-integration-template-0.0.0.tgz",
        value_hint = clap::ValueHint::FilePath
    )]
    pub integ_sdk_path: PathBuf,

    /// Inputs of the custom charts, one folder per chart
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub sdk_input_path: Option<PathBuf>,

    /// Update the configuration of generated charts
    #[arg(long)]
    pub update_config: bool,

    /// Where custom charts and CSARs are generated
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub custom_sdk_path: Option<PathBuf>,

    /// Build a CSAR installing one or more SDK charts, from this Chart.yaml
    #[arg(long, value_name = "CHART_YAML", value_parser = existing_file)]
    pub rebuild_csar: Option<PathBuf>,

    /// ENM product set the integration CSAR is targeting
    #[arg(long)]
    pub product_set: Option<String>,

    /// CSAR name and version
    #[arg(long)]
    pub csar_name_version: Option<String>,

    /// Build a light CSAR without images
    #[arg(long)]
    pub csar_light: bool,

    /// Folder holding the CSAR descriptor templates
    #[arg(long, default_value = "templates/csar", value_hint = clap::ValueHint::DirPath)]
    pub csar_templates: PathBuf,
}

fn existing_file(arg: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(arg);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("{arg} not found!"))
    }
}

impl Cli {
    /// `(flag, needed, flag given, needed given)` for flags that need another
    fn requirements(&self) -> [(&'static str, &'static str, bool, bool); 7] {
        let rebuild = self.rebuild_csar.is_some();
        [
            ("load-csar-images", "repository-url", self.load_csar_images, self.repository_url.is_some()),
            ("build-load-images", "sdk-path", self.build_load_images, self.sdk_path.is_some()),
            ("build-load-images", "sdk-input-path", self.build_load_images, self.sdk_input_path.is_some()),
            ("update-config", "repository-url", self.update_config, self.repository_url.is_some()),
            ("rebuild-csar", "custom-sdk-path", rebuild, self.custom_sdk_path.is_some()),
            ("rebuild-csar", "product-set", rebuild, self.product_set.is_some()),
            ("rebuild-csar", "repository-url", rebuild, self.repository_url.is_some()),
        ]
    }

    /// Check flags that only make sense together
    ///
    /// # Errors
    ///
    /// Returns a usage error (exit code 2) naming the first missing flag.
    pub fn validate(&self) -> Result<(), clap::Error> {
        match self.requirements().into_iter().find(|(_, _, set, present)| *set && !present) {
            Some((flag, needed, ..)) => Err(Self::command().error(
                ErrorKind::MissingRequiredArgument,
                format!("argument --{flag}: expected one argument --{needed}"),
            )),
            None => Ok(()),
        }
    }

    /// Warning for `--update-config` without anything to update
    pub fn update_config_warning(&self) -> Option<&'static str> {
        (self.update_config && self.custom_sdk_path.is_none() && !self.build_load_images)
            .then_some("argument --update-config: expected one argument --custom-sdk-path")
    }
}
