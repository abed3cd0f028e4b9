#![allow(missing_docs)]

use anyhow::{Context, Result};
use clap::Parser;
use sdk_buildmanager::{
    app_config::AppConfig,
    cli::Cli,
    logging::LogConfig,
    pipeline::{ChartRequest, CsarRequest, SdkBuildManager},
    process::{missing_binaries, SystemRunner},
};
use tracing::{debug, error, warn};

/// Exit code when a required binary is missing from `PATH`
const EXIT_MISSING_BINARY: i32 = 3;

const REQUIRED_BINARIES: [&str; 2] = ["docker", "helm"];

fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.validate() {
        e.exit();
    }

    let log = LogConfig::new(cli.verbose, cli.trace);
    log.init();

    if let Some(warning) = cli.update_config_warning() {
        warn!("{warning}");
    }

    let runner = SystemRunner;
    let missing = missing_binaries(&runner, &REQUIRED_BINARIES);
    if !missing.is_empty() {
        for binary in missing {
            eprintln!("Binary \"{binary}\" not in $PATH");
        }
        std::process::exit(EXIT_MISSING_BINARY);
    }

    if let Err(e) = run(&cli, &runner, log) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

/// Load the per-user tool configuration and log where it came from
fn load_and_log_config() -> Result<Option<AppConfig>> {
    let app_config = AppConfig::load().context("Failed to load tool configuration")?;
    let path = AppConfig::config_path()?;
    if app_config.is_some() {
        debug!("Loaded tool configuration from: {}", path.display());
    } else {
        debug!("No tool configuration file found at: {}", path.display());
    }
    Ok(app_config)
}

fn run(cli: &Cli, runner: &SystemRunner, log: LogConfig) -> Result<()> {
    let manager = SdkBuildManager::new(runner, log, load_and_log_config()?);
    let repository = cli.repository_url.as_deref().unwrap_or_default();

    if cli.load_csar_images {
        manager.load_csar_images(repository, &cli.sdk_images)?;
    }

    if cli.build_load_images {
        if let (Some(sdk_path), Some(sdk_input_path)) = (&cli.sdk_path, &cli.sdk_input_path) {
            manager.generate_chart(&ChartRequest {
                sdk_path,
                sdk_input_path,
                repository,
                output_dir: cli.custom_sdk_path.as_deref(),
                overwrite: cli.overwrite,
            })?;
        }
    }

    if let (Some(chart_yaml), Some(output_dir), Some(product_set)) =
        (&cli.rebuild_csar, &cli.custom_sdk_path, &cli.product_set)
    {
        if let Some(name_version) = &cli.csar_name_version {
            debug!("CSAR name and version come from {}, ignoring {name_version}", chart_yaml.display());
        }
        manager.rebuild_csar(&CsarRequest {
            chart_yaml,
            output_dir,
            integration_template: &cli.integ_sdk_path,
            descriptor_templates: &cli.csar_templates,
            product_set,
            repository,
            images_txt: &cli.sdk_images,
            light: cli.csar_light,
        })?;
    }

    Ok(())
}
