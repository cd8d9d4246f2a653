//! # Atlantis Container Monitor
//!
//! Local check_mk plugin for an Atlantis supervisor host. One invocation is
//! one monitoring pass; the status lines go to stdout and logs to stderr.

use anyhow::Result;
use common::config::ConfigValidation;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use monitor::cli::{AppConfig, AppConfigResolver, ConfigFallback, MonitorArgs};
use monitor::status::{Severity, StatusLine, StatusSink, StdoutSink};
use monitor::{MonitorConfig, MonitorRun};

#[tokio::main]
async fn main() -> Result<()> {
    let args = MonitorArgs::parse_args();

    let config = AppConfigResolver::resolve(&args)?;

    run_app(config).await
}

async fn run_app(config: AppConfig) -> Result<()> {
    match config {
        AppConfig::ConfigGeneration { output_path } => run_config_generation(&output_path),
        AppConfig::Run { config, fallback } => run_monitor(config, fallback).await,
    }
}

fn run_config_generation(output_path: &std::path::Path) -> Result<()> {
    let toml_content = toml::to_string_pretty(&MonitorConfig::default())?;
    std::fs::write(output_path, toml_content)?;

    eprintln!("Generated configuration file: {}", output_path.display());
    Ok(())
}

async fn run_monitor(config: MonitorConfig, fallback: Option<ConfigFallback>) -> Result<()> {
    init_logging(&config.logging.level, &config.logging.format)?;

    if let Some(fallback) = fallback {
        warn!("{}", fallback);
    }

    if let Err(e) = config.validate() {
        StdoutSink.emit(&StatusLine::new(
            Severity::Unknown,
            &config.check_name,
            format!("Invalid configuration: {e}"),
        ));
        return Err(e.into());
    }
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    let outcome = MonitorRun::from_config(config).execute().await;
    info!(?outcome, "Monitor run complete");

    Ok(())
}

fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout belongs to the check_mk agent
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(layer.json()).try_init()?;
    } else {
        registry.with(layer.compact()).try_init()?;
    }

    Ok(())
}
