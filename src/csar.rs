use crate::app_config::AppConfig;
use crate::archive;
use crate::chart::{Helm, MONITORING_IMAGE};
use crate::docker::Docker;
use crate::document::{reader, writer, ConfigValue};
use crate::files;
use crate::merge::merge;
use crate::process::{CommandRunner, CommandSpec, Output};
use crate::template;
use crate::BuildError;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Image that turns a chart directory into a CSAR
pub const PACKAGE_MANAGER: &str = "eric-am-package-manager";

const DOCKER_SOCKET: &str = "/var/run/docker.sock:/var/run/docker.sock";

/// Move `image` under `repository`
///
/// A bare host keeps the image's repository path; `host/path` replaces
/// both. The image is returned unchanged when it already lives there or
/// has no registry part.
///
/// ```text
/// host-a/path/image:1 + host-b          -> host-b/path/image:1
/// host-a/path/image:1 + host-b/internal -> host-b/internal/image:1
/// ```
pub fn retagged_image(image: &str, repository: &str) -> String {
    let Some((host, rest)) = image.split_once('/') else {
        return image.to_string();
    };
    let (path, name) = rest.rsplit_once('/').unwrap_or(("", rest));

    let (new_host, new_path) = match repository.split_once('/') {
        Some((repo_host, repo_path)) => (repo_host, repo_path),
        None => (repository, path),
    };

    if host == new_host && path == new_path {
        image.to_string()
    } else {
        format!("{new_host}/{new_path}/{name}")
    }
}

/// Image names listed in an `images.txt`, one per line
///
/// # Errors
///
/// Returns [`BuildError::NotFound`] if the file does not exist.
pub fn read_images(images_txt: &Path) -> Result<Vec<String>, BuildError> {
    if !images_txt.exists() {
        return Err(BuildError::NotFound(images_txt.to_path_buf()));
    }
    let text = fs::read_to_string(images_txt)
        .map_err(|e| BuildError::io(format!("Failed to read {}", images_txt.display()), e))?;
    Ok(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
}

/// The package manager image from `images_txt`, moved under `repository`
///
/// # Errors
///
/// Returns an error if the file is missing or lists no package manager.
pub fn package_manager_image(images_txt: &Path, repository: &str) -> Result<String, BuildError> {
    read_images(images_txt)?
        .iter()
        .find(|image| image.contains(PACKAGE_MANAGER))
        .map(|image| retagged_image(image, repository))
        .ok_or_else(|| BuildError::Config(format!("{PACKAGE_MANAGER} image is not found in {}", images_txt.display())))
}

/// An integration chart packaged for a CSAR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationChart {
    pub package: PathBuf,
    pub name: String,
    pub version: String,
}

impl IntegrationChart {
    pub fn name_version(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Files laid out for the package manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsarBuild {
    pub build_dir: PathBuf,
    pub vnfd: PathBuf,
    pub manifest: PathBuf,
}

/// Values substituted into the descriptor templates
#[derive(Debug, Clone)]
pub struct Descriptor<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub product_set: &'a str,
    pub chart_file: &'a str,
}

impl Descriptor<'_> {
    /// Placeholder/value pairs with a fresh date and descriptor id
    pub fn substitutions(&self) -> Vec<(&'static str, String)> {
        vec![
            ("<<PRODUCT>>", self.name.to_string()),
            ("<<VERSION>>", self.version.to_string()),
            ("<<DATE>>", Local::now().format("%FT%TZ").to_string()),
            ("<<DESCRIPTOR_ID>>", Uuid::new_v4().to_string()),
            ("<<PRODUCT_SET>>", self.product_set.to_string()),
            ("<<CHART>>", self.chart_file.to_string()),
        ]
    }
}

/// Builds integration charts and CSARs, and loads CSAR images
pub struct Csar<'a> {
    runner: &'a dyn CommandRunner,
    docker: Docker<'a>,
    tool_config: Option<&'a AppConfig>,
}

impl<'a> Csar<'a> {
    pub fn new(runner: &'a dyn CommandRunner, docker: Docker<'a>, tool_config: Option<&'a AppConfig>) -> Self {
        Self { runner, docker, tool_config }
    }

    /// Package an integration chart from `template`, named and versioned by
    /// the user's `chart_yaml`
    ///
    /// The template is extracted (replacing an earlier extraction), copied to
    /// `<output_dir>/integration/<name>-<version>` and the user's chart
    /// metadata merged into its `Chart.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if `chart_yaml` lacks a name or version, the template
    /// cannot be extracted, or packaging fails.
    pub fn integration_chart(&self, chart_yaml: &Path, template: &Path, output_dir: &Path) -> Result<IntegrationChart, BuildError> {
        let user_chart = reader::load_yaml_mapping(chart_yaml)?;
        let field = |key: &str| {
            user_chart.get_str(key).ok_or_else(|| {
                BuildError::Document(format!("{} has no {key}", chart_yaml.display()))
            })
        };
        let name = field("name")?;
        let version = field("version")?;

        let integ_dir = output_dir.join("integration").join(format!("{name}-{version}"));
        let extracted = archive::extract_tar(template, true)?;

        if integ_dir.is_dir() {
            fs::remove_dir_all(&integ_dir)
                .map_err(|e| BuildError::io(format!("Failed to remove {}", integ_dir.display()), e))?;
        }
        files::copy_dir_recursive(&extracted, &integ_dir)?;

        let chart_file = integ_dir.join("Chart.yaml");
        let mut chart_data = ConfigValue::from(reader::load_yaml_mapping(&chart_file)?);
        merge(&mut chart_data, user_chart.into()).map_err(|source| BuildError::MergeFailed {
            base: chart_file.clone(),
            patch: chart_yaml.to_path_buf(),
            source,
        })?;
        writer::dump_yaml(&chart_file, &chart_data)?;

        let package = Helm::new(self.runner, self.tool_config).package(&integ_dir, None, None)?;
        Ok(IntegrationChart { package, name, version })
    }

    /// Lay out `<output_dir>/csar/<name>-<version>` for the package manager
    ///
    /// # Errors
    ///
    /// Returns an error if a descriptor template is missing or a file cannot
    /// be copied or rewritten.
    pub fn prepare_csar(
        &self,
        chart: &IntegrationChart,
        product_set: &str,
        output_dir: &Path,
        templates_dir: &Path,
    ) -> Result<CsarBuild, BuildError> {
        let build_dir = output_dir.join("csar").join(chart.name_version());
        let charts_dir = build_dir.join("charts");
        let chart_file = files::file_name(&chart.package)?;
        fs::create_dir_all(&charts_dir)
            .map_err(|e| BuildError::io(format!("Failed to create directory: {}", charts_dir.display()), e))?;
        files::copy_file(&chart.package, &charts_dir.join(&chart_file))?;

        if !templates_dir.is_dir() {
            return Err(BuildError::NotFound(templates_dir.to_path_buf()));
        }
        let copy_template = |folder: &str, source: &str, target: &str| -> Result<PathBuf, BuildError> {
            let from = templates_dir.join(folder).join(source);
            if !from.exists() {
                return Err(BuildError::NotFound(from));
            }
            let to = build_dir.join(folder).join(target);
            fs::create_dir_all(build_dir.join(folder))
                .map_err(|e| BuildError::io(format!("Failed to create directory: {}", build_dir.display()), e))?;
            files::copy_file(&from, &to)?;
            Ok(to)
        };
        let manifest = copy_template("manifest", "fmsdk_descriptor.mf", "sdk_descriptor.mf")?;
        let vnfd = copy_template("vnfd", "fmsdk_descriptor.yaml", "sdk_descriptor.yaml")?;

        let descriptor = Descriptor {
            name: &chart.name,
            version: &chart.version,
            product_set,
            chart_file: &chart_file,
        };
        let substitutions = descriptor.substitutions();
        let changes: Vec<(&str, &str)> = substitutions.iter().map(|(k, v)| (*k, v.as_str())).collect();
        for file in [&manifest, &vnfd] {
            info!(target: "csar", "Updating {}", file.display());
            template::replace_all_in_file(file, &changes)?;
        }

        Ok(CsarBuild { build_dir, vnfd, manifest })
    }

    /// The `docker run` invocation of the package manager
    pub fn generate_command(&self, csar_name: &str, build: &CsarBuild, package_manager: &str, light: bool) -> CommandSpec {
        let dir = build.build_dir.to_string_lossy();
        let command = CommandSpec::new("docker")
            .args(["run", "--rm", "-v"])
            .arg(format!("{dir}:{dir}"))
            .args(["-v", DOCKER_SOCKET, "-w"])
            .arg(dir.to_string())
            .args([package_manager, "generate", "--helm3", "--helm-dir"])
            .path_arg(&build.build_dir.join("charts"))
            .args(["--name", csar_name, "--manifest"])
            .path_arg(&build.manifest)
            .arg("--vnfd")
            .path_arg(&build.vnfd)
            .arg("--set")
            .arg(format!("images.{MONITORING_IMAGE}.enabled=false"));
        if light {
            command.arg("--no-images")
        } else {
            command
        }
    }

    /// Run the package manager and return the generated `.csar`
    ///
    /// # Errors
    ///
    /// Returns an error if the package manager fails or produces no CSAR.
    pub fn generate_csar(&self, csar_name: &str, build: &CsarBuild, package_manager: &str, light: bool) -> Result<PathBuf, BuildError> {
        let command = self.generate_command(csar_name, build, package_manager, light);
        info!(target: "csar", "Creating CSAR from {}", build.build_dir.display());
        info!(target: "csar", "{command}");
        self.runner.execute(&command, Output::Log)?;

        let csar = build.build_dir.join(format!("{csar_name}.csar"));
        if !csar.exists() {
            return Err(BuildError::NotFound(csar));
        }
        self.runner.execute(&CommandSpec::new("unzip").arg("-l").path_arg(&csar), Output::Log)?;
        Ok(csar)
    }

    /// Build a CSAR installing the charts described by `chart_yaml`
    ///
    /// # Errors
    ///
    /// See [`Csar::integration_chart`], [`Csar::prepare_csar`] and
    /// [`Csar::generate_csar`].
    pub fn rebuild_csar(&self, request: &RebuildRequest<'_>) -> Result<PathBuf, BuildError> {
        let chart = self.integration_chart(request.chart_yaml, request.template, request.output_dir)?;
        let build = self.prepare_csar(&chart, request.product_set, request.output_dir, request.templates_dir)?;
        self.generate_csar(&chart.name_version(), &build, request.package_manager, request.light)
    }

    /// Load the images of an SDK CSAR and push them to `repository`
    ///
    /// `docker.tar` next to `images_txt` is loaded; every listed image not
    /// already under `repository` is retagged there (unless the new tag
    /// already exists) and its original tag dropped. Returns the new tags
    /// after pushing them.
    ///
    /// # Errors
    ///
    /// Returns an error if `images_txt` is missing or a docker command fails.
    pub fn load_csar_images(&self, repository: &str, images_txt: &Path) -> Result<Vec<String>, BuildError> {
        let images = read_images(images_txt)?;
        let docker_tar = images_txt.parent().unwrap_or_else(|| Path::new(".")).join("docker.tar");
        info!(target: "csar", "Load images from {} and re-tag to {repository}", docker_tar.display());

        self.docker.load_images(&docker_tar)?;

        let mut retagged = Vec::new();
        for image in &images {
            let new_tag = retagged_image(image, repository);
            if new_tag == *image {
                info!(target: "csar", "No need to re-tag {image}");
            } else {
                if self.docker.exists(&new_tag) {
                    info!(target: "csar", "Image already re-tagged: {new_tag}");
                } else {
                    self.docker.retag(image, &new_tag)?;
                }
                retagged.push(new_tag);
                if self.docker.exists(image) {
                    self.docker.remove(std::slice::from_ref(image))?;
                }
            }
        }

        self.docker.push_images(&retagged)?;
        Ok(retagged)
    }
}

/// Inputs of [`Csar::rebuild_csar`]
#[derive(Debug, Clone)]
pub struct RebuildRequest<'a> {
    pub chart_yaml: &'a Path,
    pub output_dir: &'a Path,
    pub template: &'a Path,
    pub templates_dir: &'a Path,
    pub product_set: &'a str,
    pub package_manager: &'a str,
    pub light: bool,
}
