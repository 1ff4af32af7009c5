//! `dirflow settings`: print the merged engine settings

use std::path::Path;

use anyhow::Result;
use clap::{Args, ValueEnum};

use crate::cli::Output;
use crate::config::{ConfigFormat, DirflowConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SettingsFormat {
    Toml,
    Json,
    Yaml,
}

impl From<SettingsFormat> for ConfigFormat {
    fn from(format: SettingsFormat) -> Self {
        match format {
            SettingsFormat::Toml => ConfigFormat::Toml,
            SettingsFormat::Json => ConfigFormat::Json,
            SettingsFormat::Yaml => ConfigFormat::Yaml,
        }
    }
}

#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "toml")]
    pub format: SettingsFormat,
}

/// Defaults, user file, `--settings` file and `DIRFLOW_*` variables, merged
pub async fn execute(
    args: SettingsArgs,
    settings_path: Option<&Path>,
    output: &Output,
) -> Result<()> {
    let config = DirflowConfig::load(settings_path, None::<serde_json::Value>)?;
    // settings that would fail `run` should fail here too
    config.engine_settings()?;

    let format = ConfigFormat::from(args.format);
    output.verbose(&format!("Rendering merged settings as {format}"));
    println!("{}", config.export(format)?.trim_end());
    Ok(())
}
