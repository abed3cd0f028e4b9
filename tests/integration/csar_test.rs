use rstest::rstest;
use sdk_buildmanager::csar::{package_manager_image, retagged_image, Csar, CsarBuild, IntegrationChart, RebuildRequest};
use sdk_buildmanager::docker::Docker;
use sdk_buildmanager::document::reader;
use sdk_buildmanager::logging::LogConfig;
use sdk_buildmanager::process::{CommandRunner, CommandSpec, Output};
use sdk_buildmanager::BuildError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

#[allow(dead_code)]
mod fixtures {
    include!("../fixtures/sdk_fixtures.rs");
}

#[cfg(test)]
mod tests {
    use super::fixtures::{write_tgz, RecordingRunner};
    use super::*;
    use pretty_assertions::assert_eq;

    const IMAGES: &str = "\
armdocker/proj/eric-am-package-manager:2.0.0
armdocker/proj/eric-enm-fmsdk:1.0.0

registry/base/eric-enm-monitoring:3.0.0
";

    fn csar<'a>(runner: &'a RecordingRunner) -> Csar<'a> {
        Csar::new(runner, Docker::new(runner, LogConfig::default()), None)
    }

    fn write_images(dir: &Path) -> PathBuf {
        let images_txt = dir.join("images.txt");
        fs::write(&images_txt, IMAGES).expect("Failed to write images.txt");
        images_txt
    }

    /// Integration template archive and the descriptor templates
    fn csar_inputs(temp: &Path) -> (PathBuf, PathBuf, PathBuf) {
        let templates = temp.join("templates");
        fs::create_dir_all(&templates).expect("Failed to create templates dir");
        let archive = templates.join("integ-template-0.0.0.tgz");
        write_tgz(
            &archive,
            "integ-template",
            &[(
                "Chart.yaml",
                "apiVersion: v2\nname: eric-enm-sdk-integration-template\nversion: 0.0.0\ndependencies:\n- name: placeholder\n",
            )],
        );

        let descriptors = temp.join("csar-templates");
        fs::create_dir_all(descriptors.join("manifest")).expect("Failed to create manifest dir");
        fs::create_dir_all(descriptors.join("vnfd")).expect("Failed to create vnfd dir");
        fs::write(
            descriptors.join("manifest").join("fmsdk_descriptor.mf"),
            "name: <<PRODUCT>>\nversion: <<VERSION>>\nchart: <<CHART>>\nset: <<PRODUCT_SET>>\n",
        )
        .expect("Failed to write manifest");
        fs::write(
            descriptors.join("vnfd").join("fmsdk_descriptor.yaml"),
            "descriptor_id: <<DESCRIPTOR_ID>>\ndate: <<DATE>>\nproduct: <<PRODUCT>>\n",
        )
        .expect("Failed to write vnfd");

        let chart_yaml = temp.join("Chart.yaml");
        fs::write(&chart_yaml, "name: my-integ\nversion: 1.0.0\ndependencies:\n- name: my-chart\n  version: 1.2.3\n")
            .expect("Failed to write user Chart.yaml");

        (archive, descriptors, chart_yaml)
    }

    #[rstest]
    #[case::host_only("host-a/path/image:latest", "host-b", "host-b/path/image:latest")]
    #[case::host_and_path("host-a/path/image:latest", "host-b/internal", "host-b/internal/image:latest")]
    #[case::nested_path("host-a/a/b/image:1", "host-b", "host-b/a/b/image:1")]
    #[case::same_place("host-a/path/image:1", "host-a/path", "host-a/path/image:1")]
    #[case::same_host("host-a/path/image:1", "host-a", "host-a/path/image:1")]
    fn test_retag_rules(#[case] image: &str, #[case] repository: &str, #[case] expected: &str) {
        assert_eq!(retagged_image(image, repository), expected);
    }

    #[test]
    fn test_package_manager_image() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let images_txt = write_images(temp_dir.path());

        assert_eq!(
            package_manager_image(&images_txt, "registry:5000/sdk").expect("found"),
            "registry:5000/sdk/eric-am-package-manager:2.0.0"
        );

        fs::write(&images_txt, "armdocker/proj/eric-enm-fmsdk:1.0.0\n").expect("Failed to write images.txt");
        assert!(package_manager_image(&images_txt, "registry:5000/sdk").is_err());
        assert!(matches!(
            package_manager_image(&temp_dir.path().join("missing.txt"), "r"),
            Err(BuildError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_csar_images() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let images_txt = write_images(temp_dir.path());
        let runner = RecordingRunner::with_images(&[
            "armdocker/proj/eric-am-package-manager:2.0.0",
            "armdocker/proj/eric-enm-fmsdk:1.0.0",
            "registry/base/eric-enm-fmsdk:1.0.0",
            "registry/base/eric-enm-monitoring:3.0.0",
        ]);

        let pushed = csar(&runner).load_csar_images("registry/base", &images_txt).expect("load images");

        assert_eq!(
            pushed,
            vec![
                "registry/base/eric-am-package-manager:2.0.0".to_string(),
                "registry/base/eric-enm-fmsdk:1.0.0".to_string(),
            ]
        );
        assert_eq!(
            runner.lines().first().cloned(),
            Some(format!("docker load --input {}", temp_dir.path().join("docker.tar").display()))
        );
        // an existing target tag is not re-created
        assert_eq!(
            runner.matching("docker tag"),
            vec!["docker tag armdocker/proj/eric-am-package-manager:2.0.0 registry/base/eric-am-package-manager:2.0.0"
                .to_string()]
        );
        assert_eq!(
            runner.matching("docker rmi"),
            vec![
                "docker rmi --force armdocker/proj/eric-am-package-manager:2.0.0".to_string(),
                "docker rmi --force armdocker/proj/eric-enm-fmsdk:1.0.0".to_string(),
            ]
        );
        assert_eq!(runner.matching("docker push").len(), 2);
    }

    #[test]
    fn test_integration_chart_merges_user_chart() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (archive, _, chart_yaml) = csar_inputs(temp_dir.path());
        let output = temp_dir.path().join("out");
        let runner = RecordingRunner::new();

        let chart = csar(&runner).integration_chart(&chart_yaml, &archive, &output).expect("integration chart");

        let integ_dir = output.join("integration").join("my-integ-1.0.0");
        assert_eq!(
            chart,
            IntegrationChart {
                package: output.join("integration").join("my-integ-1.0.0.tgz"),
                name: "my-integ".to_string(),
                version: "1.0.0".to_string(),
            }
        );
        assert_eq!(
            fs::read_to_string(integ_dir.join("Chart.yaml")).expect("read"),
            "apiVersion: v2\nname: my-integ\nversion: 1.0.0\ndependencies:\n- name: my-chart\n  version: 1.2.3\n"
        );
        assert!(output.parent().expect("parent").join("templates").join("integ-template").join("Chart.yaml").exists());
        assert_eq!(runner.matching("helm --debug package").len(), 1);
    }

    #[test]
    fn test_prepare_csar_fills_descriptors() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (_, descriptors, _) = csar_inputs(temp_dir.path());
        let package = temp_dir.path().join("my-integ-1.0.0.tgz");
        fs::write(&package, "tgz").expect("Failed to write package");
        let output = temp_dir.path().join("out");
        let runner = RecordingRunner::new();
        let chart = IntegrationChart { package, name: "my-integ".to_string(), version: "1.0.0".to_string() };

        let build = csar(&runner).prepare_csar(&chart, "22.4", &output, &descriptors).expect("prepare");

        let build_dir = output.join("csar").join("my-integ-1.0.0");
        assert_eq!(build.build_dir, build_dir);
        assert!(build_dir.join("charts").join("my-integ-1.0.0.tgz").exists());
        assert_eq!(
            fs::read_to_string(&build.manifest).expect("read manifest"),
            "name: my-integ\nversion: 1.0.0\nchart: my-integ-1.0.0.tgz\nset: 22.4\n"
        );

        let vnfd = reader::load_yaml_mapping(&build.vnfd).expect("vnfd");
        assert_eq!(build.vnfd, build_dir.join("vnfd").join("sdk_descriptor.yaml"));
        assert_eq!(vnfd.get_str("product").as_deref(), Some("my-integ"));
        let id = vnfd.get_str("descriptor_id").expect("id");
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert!(!fs::read_to_string(&build.vnfd).expect("read vnfd").contains("<<"));
    }

    #[test]
    fn test_generate_csar_command() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let build_dir = temp_dir.path().join("csar").join("my-integ-1.0.0");
        fs::create_dir_all(&build_dir).expect("Failed to create build dir");
        let build = CsarBuild {
            vnfd: build_dir.join("vnfd").join("sdk_descriptor.yaml"),
            manifest: build_dir.join("manifest").join("sdk_descriptor.mf"),
            build_dir: build_dir.clone(),
        };
        let runner = RecordingRunner::new();

        let csar_file = csar(&runner).generate_csar("my-integ-1.0.0", &build, "reg/pm:1", true).expect("generate");

        let dir = build_dir.display();
        assert_eq!(csar_file, build_dir.join("my-integ-1.0.0.csar"));
        assert_eq!(
            runner.lines(),
            vec![
                format!(
                    "docker run --rm -v {dir}:{dir} -v /var/run/docker.sock:/var/run/docker.sock -w {dir} reg/pm:1 \
                     generate --helm3 --helm-dir {dir}/charts --name my-integ-1.0.0 \
                     --manifest {dir}/manifest/sdk_descriptor.mf --vnfd {dir}/vnfd/sdk_descriptor.yaml \
                     --set images.eric-enm-monitoring.enabled=false --no-images"
                ),
                format!("unzip -l {dir}/my-integ-1.0.0.csar"),
            ]
        );
    }

    /// Succeeds at everything and produces nothing
    struct SilentRunner;

    impl CommandRunner for SilentRunner {
        fn execute(&self, _command: &CommandSpec, _output: Output) -> Result<Duration, BuildError> {
            Ok(Duration::ZERO)
        }
    }

    #[test]
    fn test_generate_csar_missing_output() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let build = CsarBuild {
            build_dir: temp_dir.path().to_path_buf(),
            vnfd: temp_dir.path().join("vnfd.yaml"),
            manifest: temp_dir.path().join("manifest.mf"),
        };
        let runner = SilentRunner;
        let csar = Csar::new(&runner, Docker::new(&runner, LogConfig::default()), None);

        assert!(!csar.generate_command("no-such", &build, "reg/pm:1", false).to_string().contains("--no-images"));
        let err = csar.generate_csar("no-such", &build, "reg/pm:1", false).expect_err("no CSAR produced");
        assert!(matches!(err, BuildError::NotFound(path) if path == temp_dir.path().join("no-such.csar")));
    }

    #[test]
    fn test_rebuild_csar_end_to_end() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (archive, descriptors, chart_yaml) = csar_inputs(temp_dir.path());
        let output = temp_dir.path().join("out");
        let runner = RecordingRunner::new();

        let csar_file = csar(&runner)
            .rebuild_csar(&RebuildRequest {
                chart_yaml: &chart_yaml,
                output_dir: &output,
                template: &archive,
                templates_dir: &descriptors,
                product_set: "22.4",
                package_manager: "reg/pm:1",
                light: false,
            })
            .expect("rebuild");

        assert_eq!(csar_file, output.join("csar").join("my-integ-1.0.0").join("my-integ-1.0.0.csar"));
        assert!(output.join("csar").join("my-integ-1.0.0").join("charts").join("my-integ-1.0.0.tgz").exists());
    }
}
