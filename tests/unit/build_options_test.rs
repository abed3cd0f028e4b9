use rstest::rstest;
use sdk_buildmanager::build_options::{config_dir, BuildOptions, IMAGE_VERSION};
use sdk_buildmanager::BuildError;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_build_yaml(input: &Path, chart: &str, text: &str) {
        let dir = config_dir(input, chart);
        fs::create_dir_all(&dir).expect("Failed to create config directory");
        fs::write(dir.join("build.yaml"), text).expect("Failed to write build.yaml");
    }

    #[test]
    fn test_load_from_input_tree() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        write_build_yaml(
            temp_dir.path(),
            "my-chart",
            "my-chart:\n  chart-version: 1.2.3\n  image-version: 4.5.6\neric-enm-fmsdk:\n  image-version: 1.0.0-1\n  image-repository: registry/proj\n",
        );

        let opts = BuildOptions::load(temp_dir.path(), "my-chart").expect("load");
        let chart = opts.require_component("my-chart").expect("chart entry");
        assert_eq!(chart.chart_version().as_deref(), Some("1.2.3"));
        assert_eq!(chart.image_version().as_deref(), Some("4.5.6"));
        assert_eq!(chart.chart_description("my-chart"), "Helm chart for my-chart");
        assert_eq!(chart.service_name("my-chart"), "my-chart");

        let base = opts.require_component("eric-enm-fmsdk").expect("base entry");
        assert_eq!(base.image_repository().as_deref(), Some("registry/proj"));
        assert!(opts.has_component("eric-enm-fmsdk"));
        assert!(!opts.has_component("eric-enm-pmsdk"));
    }

    #[rstest]
    #[case::absent("my-chart:\n  chart-version: 1.0.0\n")]
    #[case::empty("my-chart:\n  image-version: ''\n")]
    #[case::null("my-chart:\n  image-version:\n")]
    fn test_missing_option_names_file_and_component(#[case] text: &str) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        write_build_yaml(temp_dir.path(), "my-chart", text);

        let opts = BuildOptions::load(temp_dir.path(), "my-chart").expect("load");
        let err = opts.require_component("my-chart").expect("entry").require(IMAGE_VERSION).expect_err("must fail");

        assert!(matches!(err, BuildError::MissingBuildOption { option: IMAGE_VERSION, .. }));
        let message = err.to_string();
        assert!(message.contains("image-version"));
        assert!(message.contains("my-chart"));
        assert!(message.contains("build.yaml"));
    }

    #[test]
    fn test_missing_component() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        write_build_yaml(temp_dir.path(), "my-chart", "other:\n  chart-version: 1.0.0\n");

        let opts = BuildOptions::load(temp_dir.path(), "my-chart").expect("load");
        assert!(opts.component("my-chart").is_none());
        assert!(opts.require_component("my-chart").is_err());
    }

    #[test]
    fn test_missing_build_yaml() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        assert!(BuildOptions::load(temp_dir.path(), "my-chart").is_err());
    }

    #[test]
    fn test_numeric_versions_render_as_text() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        write_build_yaml(temp_dir.path(), "c", "c:\n  chart-version: 1.0\n  image-version: 7\n");

        let opts = BuildOptions::load(temp_dir.path(), "c").expect("load");
        let chart = opts.require_component("c").expect("entry");
        assert_eq!(chart.chart_version().as_deref(), Some("1.0"));
        assert_eq!(chart.image_version().as_deref(), Some("7"));
    }
}
