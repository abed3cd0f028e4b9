use crate::build_options::{BuildOptions, IMAGE_VERSION};
use crate::chart::{models_dir, sdk_type};
use crate::files;
use crate::logging::LogConfig;
use crate::process::{run_with_retry, whole_seconds, CommandRunner, CommandSpec, Output, DEFAULT_ATTEMPTS};
use crate::template;
use crate::BuildError;
use std::fs;
use std::path::Path;
use tracing::info;

/// Tag used for the models base image
const MODELS_CORE_TAG: &str = "latest";

/// Which of the two models images is being prepared or built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelsImage {
    Install,
    Remove,
}

impl ModelsImage {
    pub const fn dockerfile(self) -> &'static str {
        match self {
            Self::Install => "Dockerfile",
            Self::Remove => "Dockerfile-RemoveModels",
        }
    }

    /// Folder next to the Dockerfile receiving the packages
    pub const fn content_dir(self) -> &'static str {
        match self {
            Self::Install => "image_content",
            Self::Remove => "image_content_removemodels",
        }
    }

    /// Folder of the chart inputs holding the packages
    pub const fn input_dir(self) -> &'static str {
        match self {
            Self::Install => "models",
            Self::Remove => "uninstall",
        }
    }

    pub fn image_name(self, chart_name: &str, sdk_type: &str) -> String {
        match self {
            Self::Install => format!("{chart_name}-models-install-{sdk_type}"),
            Self::Remove => format!("{chart_name}-remove-models-{sdk_type}"),
        }
    }
}

/// Lower-cased name of the SDK input directory (`fmsdk`, `pmsdk`)
pub fn sdk_name(sdk_input_path: &Path) -> String {
    sdk_input_path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_lowercase()
}

/// Image reference `<repository>/<name>:<version>`
pub fn image_tag(repository: &str, name: &str, version: &str) -> String {
    format!("{repository}/{name}:{version}")
}

/// Parse `scriptEntries.txt`: one `name:location` pair per line
///
/// # Errors
///
/// Returns an error for a non-empty line without a `:`.
pub fn parse_script_entries(text: &str) -> Result<Vec<(String, String)>, BuildError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split_once(':')
                .map(|(name, location)| (name.trim().to_string(), location.trim().to_string()))
                .ok_or_else(|| BuildError::Document(format!("invalid script entry `{line}`, expected name:location")))
        })
        .collect()
}

/// Prepares Dockerfiles and drives the `docker` CLI
pub struct Docker<'a> {
    runner: &'a dyn CommandRunner,
    log: LogConfig,
}

impl<'a> Docker<'a> {
    pub fn new(runner: &'a dyn CommandRunner, log: LogConfig) -> Self {
        Self { runner, log }
    }

    fn noisy(&self) -> Output {
        Output::from_flag(self.log.show_command_output())
    }

    fn copy_packages(chart_name: &str, chart_dir: &Path, sdk_input_path: &Path) -> Result<(), BuildError> {
        let inputs = sdk_input_path.join(chart_name).join("jboss");
        for copied in files::copy_files(&inputs, &chart_dir.join("image_content"))? {
            info!(target: "docker", "Copied {}", copied.display());
        }
        Ok(())
    }

    fn add_scripts(chart_name: &str, chart_dir: &Path, sdk_input_path: &Path) -> Result<(), BuildError> {
        let scripts = sdk_input_path.join(chart_name).join("scripts");
        let entries_file = scripts.join("scriptEntries.txt");
        if !entries_file.exists() {
            return Ok(());
        }

        let text = fs::read_to_string(&entries_file)
            .map_err(|e| BuildError::io(format!("Failed to read {}", entries_file.display()), e))?;
        let entries = parse_script_entries(&text)?;
        if entries.is_empty() {
            return Ok(());
        }

        let image_content = chart_dir.join("image_content");
        fs::create_dir_all(&image_content)
            .map_err(|e| BuildError::io(format!("Failed to create directory: {}", image_content.display()), e))?;
        let dockerfile = chart_dir.join("Dockerfile");
        let mut content = fs::read_to_string(&dockerfile)
            .map_err(|e| BuildError::io(format!("Failed to read {}", dockerfile.display()), e))?;

        for (name, location) in entries {
            let script = scripts.join(&name);
            if !script.exists() {
                return Err(BuildError::NotFound(script));
            }
            files::copy_file(&script, &image_content.join(&name))?;
            info!(target: "docker", "Adding {name} to image under {location}");
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(&format!("COPY --chown=jboss_user:root image_content/{name} {location}"));
        }

        fs::write(&dockerfile, content)
            .map_err(|e| BuildError::io(format!("Failed to write {}", dockerfile.display()), e))
    }

    /// Prepare the main image sources of a custom chart
    ///
    /// Copies the chart's packages and scripts into `image_content/` and
    /// points the Dockerfile's base image at the SDK image named in the
    /// build options.
    ///
    /// # Errors
    ///
    /// Returns an error if an input is missing or the Dockerfile cannot be
    /// rewritten.
    pub fn generate_images(&self, chart_dir: &Path, sdk_input_path: &Path, repository: &str) -> Result<(), BuildError> {
        let chart_name = files::file_name(chart_dir)?;

        Self::copy_packages(&chart_name, chart_dir, sdk_input_path)?;
        Self::add_scripts(&chart_name, chart_dir, sdk_input_path)?;

        let build_opts = BuildOptions::load(sdk_input_path, &chart_name)?;
        let sdk = sdk_name(sdk_input_path);
        let base_component = format!("eric-enm-{sdk}");
        let base_opts = build_opts.require_component(&base_component)?;

        let version = base_opts.require(IMAGE_VERSION)?;
        let base_repository = base_opts.image_repository().unwrap_or_else(|| repository.to_string());

        let key_base = format!("ERIC_ENM_{}", sdk.to_uppercase());
        info!(target: "docker", "Setting main FROM image repository to {base_repository}");
        info!(target: "docker", "Setting main FROM image tag to {version}");
        template::set_docker_args(
            &chart_dir.join("Dockerfile"),
            &[(&format!("{key_base}_IMAGE_REPO"), &base_repository), (&format!("{key_base}_IMAGE_TAG"), &version)],
        )
    }

    /// Prepare the sources of one of the models images
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NotFound`] when the input folder is missing and
    /// [`BuildError::NoPackages`] when it holds no `.rpm` file.
    pub fn generate_images_model(
        &self,
        chart_dir: &Path,
        sdk_input_path: &Path,
        repository: &str,
        image: ModelsImage,
    ) -> Result<(), BuildError> {
        let chart_name = files::file_name(chart_dir)?;
        let sdk_type = sdk_type(sdk_input_path);
        let models = models_dir(chart_dir, &chart_name, &sdk_type);

        let inputs = sdk_input_path.join(&chart_name).join(image.input_dir());
        if !inputs.exists() {
            return Err(BuildError::NotFound(inputs));
        }
        let packages = files::entries(&inputs)?;
        if !packages.iter().any(|p| p.extension().and_then(|e| e.to_str()) == Some("rpm")) {
            return Err(BuildError::NoPackages(inputs));
        }

        for copied in files::copy_files(&inputs, &models.join(image.content_dir()))? {
            info!(target: "docker", "Copied {}", copied.display());
        }

        info!(target: "docker", "Setting main FROM image repository to {repository}");
        info!(target: "docker", "Setting main FROM image tag to {MODELS_CORE_TAG}");
        template::set_docker_args(
            &models.join(image.dockerfile()),
            &[
                ("ERIC_ENM_MODELS_CORE_IMAGE_REPO", repository),
                ("ERIC_ENM_MODELS_CORE_IMAGE_TAG", MODELS_CORE_TAG),
            ],
        )
    }

    fn build(&self, dockerfile: &Path, tag: &str, context: &Path, cwd: &Path) -> Result<(), BuildError> {
        let command = CommandSpec::new("docker")
            .args(["build", "--network=host", "--file"])
            .path_arg(dockerfile)
            .args(["-t", tag])
            .path_arg(context)
            .current_dir(cwd);

        info!(target: "docker", "Building {} with tag {tag}", dockerfile.display());
        let elapsed = self.runner.execute(&command, Output::Log)?;
        info!(target: "docker", "Build took {} seconds", whole_seconds(elapsed));
        Ok(())
    }

    /// Build the main image and both models images; returns their tags
    ///
    /// # Errors
    ///
    /// Returns an error if the build options lack an image version or a
    /// build fails.
    pub fn build_images(&self, chart_dir: &Path, repository: &str, sdk_input_path: &Path) -> Result<Vec<String>, BuildError> {
        let chart_name = files::file_name(chart_dir)?;
        let build_opts = BuildOptions::load(sdk_input_path, &chart_name)?;
        let version = build_opts.require_component(&chart_name)?.require(IMAGE_VERSION)?;

        let main_tag = image_tag(repository, &chart_name, &version);
        self.build(&chart_dir.join("Dockerfile"), &main_tag, chart_dir, chart_dir)?;

        let sdk_type = sdk_type(sdk_input_path);
        let models = models_dir(chart_dir, &chart_name, &sdk_type);
        let mut tags = vec![main_tag];
        for image in [ModelsImage::Install, ModelsImage::Remove] {
            info!(target: "docker", "Building model image");
            let tag = image_tag(repository, &image.image_name(&chart_name, &sdk_type), &version);
            self.build(&models.join(image.dockerfile()), &tag, &models, chart_dir)?;
            tags.push(tag);
        }
        Ok(tags)
    }

    /// Push every tag, retrying each push up to three times
    ///
    /// # Errors
    ///
    /// Returns the error of the first tag that could not be pushed.
    pub fn push_images(&self, tags: &[String]) -> Result<(), BuildError> {
        for tag in tags {
            info!(target: "docker", "Pushing {tag}");
            let command = CommandSpec::new("docker").args(["push", tag.as_str()]);
            let elapsed = run_with_retry(self.runner, &command, self.noisy(), DEFAULT_ATTEMPTS)?;
            info!(target: "docker", "Push took {} seconds", whole_seconds(elapsed));
        }
        Ok(())
    }

    /// `docker load` an image archive, retrying up to three times
    ///
    /// # Errors
    ///
    /// Returns an error if every attempt fails.
    pub fn load_images(&self, docker_tar: &Path) -> Result<(), BuildError> {
        let command = CommandSpec::new("docker").args(["load", "--input"]).path_arg(docker_tar);
        let elapsed = run_with_retry(self.runner, &command, self.noisy(), DEFAULT_ATTEMPTS)?;
        info!(target: "docker", "Load took {} seconds", whole_seconds(elapsed));
        Ok(())
    }

    /// Whether `tag` exists in the local image store
    pub fn exists(&self, tag: &str) -> bool {
        let command = CommandSpec::new("docker").args(["image", "inspect", tag]);
        self.runner.execute(&command, Output::Quiet).is_ok()
    }

    /// Force-remove local tags
    ///
    /// # Errors
    ///
    /// Returns an error if `docker rmi` fails.
    pub fn remove(&self, tags: &[String]) -> Result<(), BuildError> {
        for tag in tags {
            info!(target: "docker", "Removing tag {tag}");
            self.runner
                .execute(&CommandSpec::new("docker").args(["rmi", "--force", tag.as_str()]), self.noisy())?;
        }
        Ok(())
    }

    /// Tag `tag` as `new_tag`
    ///
    /// # Errors
    ///
    /// Returns an error if `docker tag` fails.
    pub fn retag(&self, tag: &str, new_tag: &str) -> Result<(), BuildError> {
        info!(target: "docker", "Re-tagging {tag} to {new_tag}");
        self.runner.execute(&CommandSpec::new("docker").args(["tag", tag, new_tag]), self.noisy())?;
        Ok(())
    }
}
