//! Configuration command implementations

use crate::cli::{ConfigCommands, OutputFormat, Output};
use crate::config::DrainpoolConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Execute config commands
pub async fn execute(
    cmd: ConfigCommands,
    custom_config: Option<&Path>,
    format: OutputFormat,
    output: &Output,
) -> Result<()> {
    match cmd {
        ConfigCommands::Validate => validate(custom_config, output).await,
        ConfigCommands::Show => show(custom_config, format, output).await,
    }
}

async fn validate(custom_config: Option<&Path>, output: &Output) -> Result<()> {
    output.header("Validating configuration");

    let config = match DrainpoolConfig::load_with_custom_config(custom_config) {
        Ok(config) => config,
        Err(err) => {
            output.error("Configuration is invalid");
            return Err(err);
        }
    };

    output.success("Configuration is valid");
    output.blank_line();
    output.step("Configuration summary");
    output.key_value(
        "Workers:",
        &format!(
            "{} (configured {})",
            config.pool.effective_workers(),
            config.pool.workers
        ),
        true,
    );
    output.key_value(
        "Queue:",
        &match config.pool.capacity() {
            None => "unbounded".to_string(),
            Some(0) => "rendezvous".to_string(),
            Some(cap) => format!("bounded ({cap})"),
        },
        false,
    );
    output.key_value("Progress:", &format!("{:?}", config.progress.mode).to_lowercase(), false);

    Ok(())
}

async fn show(custom_config: Option<&Path>, format: OutputFormat, output: &Output) -> Result<()> {
    let config = DrainpoolConfig::load_with_custom_config(custom_config)?;

    let rendered = match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?
        }
        OutputFormat::Text => {
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?
        }
    };

    output.raw(&rendered);
    Ok(())
}
