use rstest::rstest;
use sdk_buildmanager::template::{replace_docker_arg, replace_in_file, set_docker_args};
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOCKERFILE: &str = "\
ARG ERIC_ENM_FMSDK_IMAGE_REPO=armdocker/proj
ARG ERIC_ENM_FMSDK_IMAGE_TAG=latest
FROM ${ERIC_ENM_FMSDK_IMAGE_REPO}/eric-enm-fmsdk:${ERIC_ENM_FMSDK_IMAGE_TAG}
COPY image_content/*.rpm /var/tmp/
";

    #[test]
    fn test_set_docker_args_on_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dockerfile = temp_dir.path().join("Dockerfile");
        fs::write(&dockerfile, DOCKERFILE).expect("Failed to write Dockerfile");

        set_docker_args(
            &dockerfile,
            &[("ERIC_ENM_FMSDK_IMAGE_REPO", "registry:5000/sdk"), ("ERIC_ENM_FMSDK_IMAGE_TAG", "1.2.3-4")],
        )
        .expect("rewrite");

        let content = fs::read_to_string(&dockerfile).expect("Failed to read Dockerfile");
        assert_eq!(
            content,
            DOCKERFILE
                .replace("=armdocker/proj", "=registry:5000/sdk")
                .replace("_TAG=latest", "_TAG=1.2.3-4")
        );
    }

    #[rstest]
    #[case::indented("  ARG TAG=old\n", "  ARG TAG=new\n")]
    #[case::every_stage("ARG TAG=a\nFROM x\nARG TAG=b\n", "ARG TAG=new\nFROM x\nARG TAG=new\n")]
    #[case::no_match("ARG OTHER=a\n", "ARG OTHER=a\n")]
    #[case::empty_value("ARG TAG=\n", "ARG TAG=new\n")]
    fn test_replace_docker_arg_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(replace_docker_arg("TAG", "new", input).expect("replace"), expected);
    }

    #[test]
    fn test_set_docker_args_missing_file_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        assert!(set_docker_args(&temp_dir.path().join("Dockerfile"), &[("A", "b")]).is_err());
    }

    #[test]
    fn test_replace_in_file_reports_change() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("svc.yaml");
        fs::write(&path, "name: eric-enmsg-custom-fm-oneflow\n").expect("Failed to write file");

        assert!(replace_in_file(&path, "eric-enmsg-custom-fm-oneflow", "my-service").expect("replace"));
        assert!(!replace_in_file(&path, "eric-enmsg-custom-fm-oneflow", "my-service").expect("replace"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "name: my-service\n");
    }
}
