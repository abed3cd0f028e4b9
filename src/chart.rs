use crate::app_config::AppConfig;
use crate::build_options::{self, BuildOptions, CHART_VERSION, IMAGE_VERSION};
use crate::document::{format, reader, writer, ConfigDocument, ConfigValue, Scalar};
use crate::files;
use crate::merge::merge;
use crate::process::{whole_seconds, CommandRunner, CommandSpec, Output};
use crate::template;
use crate::BuildError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Image key of the monitoring sidecar in every SDK chart
pub const MONITORING_IMAGE: &str = "eric-enm-monitoring";

/// Service names used by the SDK templates before customization
const TEMPLATE_SERVICE_NAMES: [&str; 2] = ["eric-enmsg-custom-fm-oneflow", "eric-enmsg-custom-pm-oneflow"];

/// Manifests that carry the template service name
const SERVICE_TEMPLATES: [&str; 3] = ["eric_ingress.yaml", "eric_ingress_ipv6.yaml", "svc_ipv6.yaml"];

/// Two-letter SDK type (`fm`, `pm`) taken from the input directory name
pub fn sdk_type(sdk_input_path: &Path) -> String {
    sdk_input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase()
        .chars()
        .take(2)
        .collect()
}

/// Split `host/some/path` into the registry host and the repository path
pub fn split_repository(repository: &str) -> (&str, &str) {
    repository.split_once('/').unwrap_or((repository, ""))
}

/// Directory holding the models image sources of a custom chart
pub fn models_dir(custom_dir: &Path, chart_name: &str, sdk_type: &str) -> PathBuf {
    custom_dir.join(format!("{chart_name}-models-{sdk_type}"))
}

/// Helm chart directory inside a custom chart
pub fn helm_chart_dir(custom_dir: &Path, chart_name: &str) -> PathBuf {
    custom_dir.join("chart").join(chart_name)
}

/// A custom chart generated from the SDK template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomChart {
    pub dir: PathBuf,
    pub version: String,
}

fn mapping_mut<'a>(
    doc: &'a mut ConfigDocument,
    key: &str,
    file: &Path,
) -> Result<&'a mut ConfigDocument, BuildError> {
    doc.get_mapping_mut(key).ok_or_else(|| {
        BuildError::Document(format!("{}: expected a mapping under `{key}`", file.display()))
    })
}

fn image_entry(name: String, tag: Option<&str>) -> ConfigValue {
    let mut entry = ConfigDocument::new();
    entry.insert("name", name);
    entry.insert("tag", tag.map_or_else(ConfigValue::null, ConfigValue::from));
    entry.into()
}

fn load_mapping(path: &Path) -> Result<ConfigDocument, BuildError> {
    reader::load_yaml_mapping(path)
}

/// Clone the SDK chart template into a chart named `chart_name`
///
/// The template is copied to `<output_dir>/<chart_name>` (or next to the
/// template when no output directory is given), its intermediate chart is
/// renamed, and `Chart.yaml` and `values.yaml` are rewritten from the
/// chart's build options.
///
/// # Errors
///
/// Returns an error if:
/// - The target exists and `overwrite` is false
/// - `build.yaml` has no entry or no `chart-version` for the chart
/// - The template does not have the expected layout
pub fn generate_custom_chart(
    templates_dir: &Path,
    chart_name: &str,
    sdk_input_path: &Path,
    output_dir: Option<&Path>,
    overwrite: bool,
    repository: &str,
) -> Result<CustomChart, BuildError> {
    let custom_dir = match output_dir {
        Some(dir) => dir.join(chart_name),
        None => templates_dir.parent().unwrap_or_else(|| Path::new(".")).join(chart_name),
    };

    info!(target: "chart", "Generating custom chart for {chart_name} from {}", templates_dir.display());

    if custom_dir.is_dir() {
        if !overwrite {
            return Err(BuildError::AlreadyExists(format!(
                "A custom chart named \"{chart_name}\" already exists in {}",
                custom_dir.display()
            )));
        }
        debug!(target: "chart", "Removing existing {}", custom_dir.display());
        fs::remove_dir_all(&custom_dir)
            .map_err(|e| BuildError::io(format!("Failed to remove {}", custom_dir.display()), e))?;
    }

    let build_opts = BuildOptions::load(sdk_input_path, chart_name)?;
    let image_opts = build_opts.require_component(chart_name)?;
    let sdk_type = sdk_type(sdk_input_path);

    files::copy_dir_recursive(templates_dir, &custom_dir)?;

    let chart_root = custom_dir.join("chart");
    let inter_name = files::entry_names(&chart_root)?
        .into_iter()
        .next()
        .ok_or_else(|| BuildError::NotFound(chart_root.join("<chart>")))?;

    info!(target: "chart", "Updating {} with new name \"{chart_name}\"", custom_dir.display());
    let chart_dir = chart_root.join(chart_name);
    files::rename(&chart_root.join(&inter_name), &chart_dir)?;

    let description = image_opts.chart_description(chart_name);
    let chart_version = image_opts.require(CHART_VERSION)?;

    let chart_yaml = chart_dir.join("Chart.yaml");
    let mut chart_data = load_mapping(&chart_yaml)?;
    info!(target: "chart", "Chart name: {chart_name}");
    chart_data.insert("name", chart_name);
    info!(target: "chart", "Chart version: {chart_version}");
    chart_data.insert("version", chart_version.as_str());
    info!(target: "chart", "Chart description: {description}");
    chart_data.insert("description", description);
    writer::dump_yaml(&chart_yaml, &chart_data.into())?;

    let service_name = image_opts.service_name(chart_name);
    let values_yaml = chart_dir.join("values.yaml");
    let mut values = load_mapping(&values_yaml)?;
    let customization = ValuesCustomization {
        chart_name,
        inter_name: &inter_name,
        sdk_type: &sdk_type,
        image_version: image_opts.image_version(),
        service_name: &service_name,
        repository,
    };
    customization.apply(&mut values, &values_yaml, &build_opts)?;
    writer::dump_yaml(&values_yaml, &values.into())?;

    files::rename(
        &custom_dir.join(format!("eric-enm-custom-models-{sdk_type}-oneflow")),
        &models_dir(&custom_dir, chart_name, &sdk_type),
    )?;

    let templates = chart_dir.join("templates");
    for manifest in SERVICE_TEMPLATES {
        for template_service in TEMPLATE_SERVICE_NAMES {
            template::replace_in_file(&templates.join(manifest), template_service, &service_name)?;
        }
    }

    Ok(CustomChart { dir: custom_dir, version: chart_version })
}

/// Rewrites the template's `values.yaml` for a named chart
struct ValuesCustomization<'a> {
    chart_name: &'a str,
    inter_name: &'a str,
    sdk_type: &'a str,
    image_version: Option<String>,
    service_name: &'a str,
    repository: &'a str,
}

impl ValuesCustomization<'_> {
    fn apply(&self, values: &mut ConfigDocument, file: &Path, build_opts: &BuildOptions) -> Result<(), BuildError> {
        let chart = self.chart_name;
        let sdk_type = self.sdk_type;
        let tag = self.image_version.as_deref();

        let images = mapping_mut(values, "images", file)?;
        if images.remove(self.inter_name).is_none() {
            return Err(BuildError::Document(format!(
                "{}: no image `{}` to rename",
                file.display(),
                self.inter_name
            )));
        }
        images.insert(chart, image_entry(chart.to_string(), tag));
        images.insert(
            format!("{sdk_type}-sdk-models"),
            image_entry(format!("{chart}-models-install-{sdk_type}"), tag),
        );
        images.insert(
            format!("{sdk_type}-sdk-remove-models"),
            image_entry(format!("{chart}-remove-models-{sdk_type}"), tag),
        );

        let replicas_key = format!("replicas-{}", self.inter_name);
        let replicas = values.remove(&replicas_key).ok_or_else(|| {
            BuildError::Document(format!("{}: missing `{replicas_key}`", file.display()))
        })?;
        values.insert(format!("replicas-{chart}"), replicas);

        let service = mapping_mut(values, "service", file)?;
        service.insert("name", self.service_name);
        service.insert("sgname", self.service_name);
        info!(target: "chart", "Setting service.name to {}", self.service_name);

        let (registry_url, repo_path) = split_repository(self.repository);
        let registry: ConfigDocument = [("url", registry_url)].into_iter().collect();
        mapping_mut(values, "global", file)?.insert("registry", registry);
        mapping_mut(values, "imageCredentials", file)?.insert("repoPath", repo_path);

        self.update_monitoring(values, file, build_opts)
    }

    fn update_monitoring(
        &self,
        values: &mut ConfigDocument,
        file: &Path,
        build_opts: &BuildOptions,
    ) -> Result<(), BuildError> {
        let images = mapping_mut(values, "images", file)?;
        let Some(monitoring) = images.get_mapping_mut(MONITORING_IMAGE) else {
            debug!(target: "chart", "{} has no {MONITORING_IMAGE} image", file.display());
            return Ok(());
        };

        let image_name = monitoring.get_str("name").unwrap_or_default();
        if let Some(opts) = build_opts.component(&image_name) {
            let tag = opts.require(IMAGE_VERSION)?;
            info!(target: "chart", "Updating {image_name} to {tag}");
            monitoring.insert("tag", tag);
        } else {
            info!(
                target: "chart",
                "No {MONITORING_IMAGE} build options set, leaving as {}",
                monitoring.get_str("tag").unwrap_or_default()
            );
        }
        Ok(())
    }
}

/// Merge `patch_path` into `base_path` and write the result back
///
/// Nothing is written when the merge fails.
///
/// # Errors
///
/// Returns [`BuildError::MergeFailed`] naming both files on a shape
/// mismatch, or an I/O or parse error.
pub fn merge_file_into(base_path: &Path, patch_path: &Path) -> Result<(), BuildError> {
    let mut base = reader::load_yaml(base_path)?;
    let patch = reader::load_yaml(patch_path)?;

    merge(&mut base, patch).map_err(|source| BuildError::MergeFailed {
        base: base_path.to_path_buf(),
        patch: patch_path.to_path_buf(),
        source,
    })?;

    writer::dump_yaml(base_path, &base)
}

/// Layer the chart's configuration patches onto a generated custom chart
///
/// # Errors
///
/// Returns an error if any patch cannot be loaded or merged, or the chart
/// does not have the expected layout.
pub fn merge_custom_chart_config(
    custom_dir: &Path,
    chart_name: &str,
    sdk_input_path: &Path,
) -> Result<(), BuildError> {
    merge_values_yaml(custom_dir, chart_name, sdk_input_path)?;
    merge_global_properties(custom_dir, chart_name, sdk_input_path)?;
    merge_named_yaml(custom_dir, chart_name, sdk_input_path)
}

fn merge_values_yaml(custom_dir: &Path, chart_name: &str, sdk_input_path: &Path) -> Result<(), BuildError> {
    let values_yaml = helm_chart_dir(custom_dir, chart_name).join("values.yaml");
    let values_inputs = build_options::config_dir(sdk_input_path, chart_name).join("values.yaml");

    info!(target: "chart", "Merging {} into {}", values_inputs.display(), values_yaml.display());
    merge_file_into(&values_yaml, &values_inputs)
}

fn merge_global_properties(
    custom_dir: &Path,
    chart_name: &str,
    sdk_input_path: &Path,
) -> Result<(), BuildError> {
    let properties_json = build_options::config_dir(sdk_input_path, chart_name).join("global-properties.json");

    let appconfig = helm_chart_dir(custom_dir, chart_name).join("appconfig");
    let configmaps = appconfig.join("configmaps");
    let configmap_name = format!("gp-{chart_name}");
    let renamed = configmaps.join(format!("{configmap_name}.yaml"));
    files::rename(&configmaps.join("globalproperties.yaml"), &renamed)?;

    if properties_json.exists() {
        info!(target: "chart", "Adding {} to {}", properties_json.display(), renamed.display());
        let properties = match reader::load_json(&properties_json)? {
            ConfigValue::Mapping(doc) => doc,
            other => {
                return Err(BuildError::Document(format!(
                    "{}: expected an object, found a {}",
                    properties_json.display(),
                    other.kind()
                )))
            },
        };
        let existing = load_mapping(&renamed)?;
        fs::write(&renamed, global_properties_block(&properties, &existing))
            .map_err(|e| BuildError::io(format!("Failed to write {}", renamed.display()), e))?;
    }

    let volumes_yaml = appconfig.join("volumes.yaml");
    let mut volumes = reader::load_yaml(&volumes_yaml)?;
    let gp_volume = volumes
        .as_sequence_mut()
        .into_iter()
        .flatten()
        .filter_map(ConfigValue::as_mapping_mut)
        .find(|volume| volume.get_str("name").as_deref() == Some("gp"));
    if let Some(volume) = gp_volume {
        mapping_mut(volume, "configMap", &volumes_yaml)?.insert("name", configmap_name);
    }
    writer::dump_yaml(&volumes_yaml, &volumes)
}

/// Property value as the services read it: `None`, `True` and `False` for
/// null and booleans, nested values inline
fn property_text(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Scalar(Scalar::Null) => "None".to_string(),
        ConfigValue::Scalar(Scalar::Bool(true)) => "True".to_string(),
        ConfigValue::Scalar(Scalar::Bool(false)) => "False".to_string(),
        ConfigValue::Scalar(scalar) => scalar.to_plain_string(),
        other => format::compact_json(other),
    }
}

/// `global.properties` block: the input properties first, then the lines the
/// template already carried
fn global_properties_block(properties: &ConfigDocument, existing: &ConfigDocument) -> String {
    let mut lines: Vec<String> =
        properties.iter().map(|(key, value)| format!("{key}={}", property_text(value))).collect();
    if let Some(current) = existing.get_str("global.properties") {
        lines.extend(current.lines().map(str::to_string));
    }

    let mut block = String::from("global.properties: |\n");
    for line in lines {
        block.push_str("  ");
        block.push_str(&line);
        block.push('\n');
    }
    block
}

fn merge_named_yaml(custom_dir: &Path, chart_name: &str, sdk_input_path: &Path) -> Result<(), BuildError> {
    let config = build_options::config_dir(sdk_input_path, chart_name);
    let appconfig = helm_chart_dir(custom_dir, chart_name).join("appconfig");

    let patches = files::entry_names(&config)?.into_iter().filter(|name| {
        // build.yaml is read directly and values.yaml has its own merge
        name.ends_with(".yaml") && name != "build.yaml" && name != "values.yaml"
    });

    for name in patches {
        let patch = config.join(&name);
        let target = appconfig.join(&name);

        if target.exists() {
            info!(target: "chart", "Merging {} with {}", patch.display(), target.display());
            merge_file_into(&target, &patch)?;
        } else {
            info!(target: "chart", "Copying {} to {}", patch.display(), target.display());
            files::copy_file(&patch, &target)?;
        }
    }
    Ok(())
}

/// Runs `helm` to package charts
pub struct Helm<'a> {
    runner: &'a dyn CommandRunner,
    tool_config: Option<&'a AppConfig>,
}

impl<'a> Helm<'a> {
    pub fn new(runner: &'a dyn CommandRunner, tool_config: Option<&'a AppConfig>) -> Self {
        Self { runner, tool_config }
    }

    fn flags(&self, path: &[&str]) -> Vec<String> {
        self.tool_config
            .and_then(|cfg| cfg.command_flags("helm", path))
            .map(|flags| flags.iter().flat_map(|f| f.split_whitespace().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    /// Commands that update, lint and package `chart` into `output_dir`
    pub fn package_commands(&self, chart: &Path, output_dir: &Path) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("helm")
                .args(["--debug", "dependency", "update"])
                .args(self.flags(&["dependency", "update"]))
                .path_arg(chart),
            CommandSpec::new("helm").args(["--debug", "lint"]).args(self.flags(&["lint"])).path_arg(chart),
            CommandSpec::new("helm")
                .args(["--debug", "package"])
                .path_arg(chart)
                .args(self.flags(&["package"]))
                .arg("-d")
                .path_arg(output_dir),
        ]
    }

    /// Package a chart and return the path of the generated `.tgz`
    ///
    /// With `chart_name`, `chart_path` is a custom chart directory and the
    /// Helm chart is `chart_path/chart/<name>`; otherwise `chart_path` is the
    /// Helm chart itself and its name and version come from `Chart.yaml`.
    /// With `sdk_input_path`, the version comes from the chart's build
    /// options. The package is written next to `chart_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chart version cannot be determined, a `helm`
    /// command fails, or the expected package is missing afterwards.
    pub fn package(
        &self,
        chart_path: &Path,
        chart_name: Option<&str>,
        sdk_input_path: Option<&Path>,
    ) -> Result<PathBuf, BuildError> {
        let (chart, name, mut version) = if let Some(name) = chart_name {
            (helm_chart_dir(chart_path, name), name.to_string(), None)
        } else {
            let chart_yaml = load_mapping(&chart_path.join("Chart.yaml"))?;
            let name = chart_yaml.get_str("name").ok_or_else(|| {
                BuildError::Document(format!("{}/Chart.yaml has no name", chart_path.display()))
            })?;
            (chart_path.to_path_buf(), name, chart_yaml.get_str("version"))
        };

        if let Some(input) = sdk_input_path {
            let build_opts = BuildOptions::load(input, &name)?;
            version = build_opts.require_component(&name)?.chart_version();
        }
        let version = version.ok_or_else(|| BuildError::MissingBuildOption {
            component: name.clone(),
            option: CHART_VERSION,
            path: chart.join("Chart.yaml"),
        })?;

        let output_dir = chart_path.parent().unwrap_or_else(|| Path::new("."));
        let steps = [
            format!("Updating {name} chart dependencies"),
            format!("Linting {name} chart"),
            format!("Packaging chart {name} to {}", output_dir.display()),
        ];

        for (step, command) in steps.iter().zip(self.package_commands(&chart, output_dir)) {
            info!(target: "chart", "{step}");
            let elapsed = self.runner.execute(&command, Output::Log)?;
            info!(target: "chart", "Helm took {} seconds", whole_seconds(elapsed));
        }

        let chart_file = output_dir.join(format!("{name}-{version}.tgz"));
        if !chart_file.exists() {
            return Err(BuildError::NotFound(chart_file));
        }
        info!(target: "chart", "Generated {}", chart_file.display());
        Ok(chart_file)
    }
}
