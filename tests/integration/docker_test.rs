use sdk_buildmanager::chart::generate_custom_chart;
use sdk_buildmanager::docker::{Docker, ModelsImage};
use sdk_buildmanager::logging::LogConfig;
use sdk_buildmanager::BuildError;
use std::fs;

#[allow(dead_code)]
mod fixtures {
    include!("../fixtures/sdk_fixtures.rs");
}

#[cfg(test)]
mod tests {
    use super::fixtures::{RecordingRunner, SdkTree, CHART, MAIN_DOCKERFILE, MODELS_DOCKERFILE};
    use super::*;
    use pretty_assertions::assert_eq;

    const REPOSITORY: &str = "registry:5000/proj";

    fn generated_tree() -> SdkTree {
        let tree = SdkTree::new();
        generate_custom_chart(&tree.templates, CHART, &tree.inputs, Some(&tree.output), false, REPOSITORY)
            .expect("Failed to generate custom chart");
        tree
    }

    #[test]
    fn test_generate_images_prepares_main_dockerfile() {
        let tree = generated_tree();
        let runner = RecordingRunner::new();

        Docker::new(&runner, LogConfig::default())
            .generate_images(&tree.custom_dir(), &tree.inputs, REPOSITORY)
            .expect("generate images");

        let image_content = tree.custom_dir().join("image_content");
        assert!(image_content.join("app.rpm").exists());
        assert!(image_content.join("start.sh").exists());

        let expected = format!(
            "{}COPY --chown=jboss_user:root image_content/start.sh /opt/start.sh",
            MAIN_DOCKERFILE
                .replace("_REPO=armdocker", "_REPO=sdk-registry/base")
                .replace("_TAG=latest", "_TAG=9.9.9")
        );
        assert_eq!(tree.read(&tree.custom_dir().join("Dockerfile")), expected);
        assert!(runner.lines().is_empty());
    }

    #[test]
    fn test_generate_images_defaults_to_repository() {
        let tree = generated_tree();
        fs::write(
            tree.inputs.join(CHART).join("config").join("build.yaml"),
            "my-chart:\n  chart-version: 1.0.0\n  image-version: 1.0.0\neric-enm-fmsdk:\n  image-version: 3.0.0\n",
        )
        .expect("Failed to write build.yaml");
        let runner = RecordingRunner::new();

        Docker::new(&runner, LogConfig::default())
            .generate_images(&tree.custom_dir(), &tree.inputs, REPOSITORY)
            .expect("generate images");

        let dockerfile = tree.read(&tree.custom_dir().join("Dockerfile"));
        assert!(dockerfile.contains("ARG ERIC_ENM_FMSDK_IMAGE_REPO=registry:5000/proj\n"));
        assert!(dockerfile.contains("ARG ERIC_ENM_FMSDK_IMAGE_TAG=3.0.0\n"));
    }

    #[test]
    fn test_generate_images_model_install_and_remove() {
        let tree = generated_tree();
        let runner = RecordingRunner::new();
        let docker = Docker::new(&runner, LogConfig::default());

        docker
            .generate_images_model(&tree.custom_dir(), &tree.inputs, REPOSITORY, ModelsImage::Install)
            .expect("install image");
        docker
            .generate_images_model(&tree.custom_dir(), &tree.inputs, REPOSITORY, ModelsImage::Remove)
            .expect("remove image");

        let models = tree.models_dir();
        assert!(models.join("image_content").join("model.rpm").exists());
        assert!(models.join("image_content_removemodels").join("remove.rpm").exists());

        let expected = MODELS_DOCKERFILE
            .replace("_REPO=armdocker", "_REPO=registry:5000/proj")
            .replace("_TAG=1.0.0", "_TAG=latest");
        assert_eq!(tree.read(&models.join("Dockerfile")), expected);
        assert_eq!(tree.read(&models.join("Dockerfile-RemoveModels")), expected);
    }

    #[test]
    fn test_generate_images_model_without_packages() {
        let tree = generated_tree();
        let models = tree.inputs.join(CHART).join("models");
        fs::remove_file(models.join("model.rpm")).expect("Failed to remove package");
        fs::write(models.join("README"), "no packages").expect("Failed to write file");
        let runner = RecordingRunner::new();

        let err = Docker::new(&runner, LogConfig::default())
            .generate_images_model(&tree.custom_dir(), &tree.inputs, REPOSITORY, ModelsImage::Install)
            .expect_err("no rpm must fail");
        assert!(matches!(err, BuildError::NoPackages(path) if path == models));
    }

    #[test]
    fn test_generate_images_model_missing_folder() {
        let tree = generated_tree();
        let uninstall = tree.inputs.join(CHART).join("uninstall");
        fs::remove_dir_all(&uninstall).expect("Failed to remove folder");
        let runner = RecordingRunner::new();

        let err = Docker::new(&runner, LogConfig::default())
            .generate_images_model(&tree.custom_dir(), &tree.inputs, REPOSITORY, ModelsImage::Remove)
            .expect_err("missing folder must fail");
        assert!(matches!(err, BuildError::NotFound(path) if path == uninstall));
    }

    #[test]
    fn test_build_images_tags_and_commands() {
        let tree = generated_tree();
        let runner = RecordingRunner::new();

        let tags = Docker::new(&runner, LogConfig::default())
            .build_images(&tree.custom_dir(), REPOSITORY, &tree.inputs)
            .expect("build images");

        assert_eq!(
            tags,
            vec![
                "registry:5000/proj/my-chart:4.5.6".to_string(),
                "registry:5000/proj/my-chart-models-install-fm:4.5.6".to_string(),
                "registry:5000/proj/my-chart-remove-models-fm:4.5.6".to_string(),
            ]
        );

        let custom = tree.custom_dir().display().to_string();
        let models = tree.models_dir().display().to_string();
        assert_eq!(
            runner.lines(),
            vec![
                format!("docker build --network=host --file {custom}/Dockerfile -t {} {custom}", tags[0]),
                format!("docker build --network=host --file {models}/Dockerfile -t {} {models}", tags[1]),
                format!("docker build --network=host --file {models}/Dockerfile-RemoveModels -t {} {models}", tags[2]),
            ]
        );
        assert!(runner.commands.borrow().iter().all(|c| c.cwd.as_deref() == Some(tree.custom_dir().as_path())));
    }

    #[test]
    fn test_push_gives_up_after_three_attempts() {
        let mut runner = RecordingRunner::new();
        runner.failing.insert("docker push host/a:1".to_string());

        let err = Docker::new(&runner, LogConfig::default())
            .push_images(&["host/a:1".to_string(), "host/b:1".to_string()])
            .expect_err("push must fail");

        assert!(matches!(err, BuildError::CommandFailed { .. }));
        assert_eq!(runner.matching("docker push host/a:1").len(), 3);
        assert!(runner.matching("docker push host/b:1").is_empty());
    }

    #[test]
    fn test_exists_retag_remove() {
        let runner = RecordingRunner::with_images(&["host/a:1"]);
        let docker = Docker::new(&runner, LogConfig::new(true, false));

        assert!(docker.exists("host/a:1"));
        assert!(!docker.exists("other/a:1"));

        docker.retag("host/a:1", "other/a:1").expect("retag");
        assert!(docker.exists("other/a:1"));

        docker.remove(&["host/a:1".to_string()]).expect("remove");
        assert!(!docker.exists("host/a:1"));
        assert_eq!(runner.matching("docker rmi"), vec!["docker rmi --force host/a:1".to_string()]);
    }
}
