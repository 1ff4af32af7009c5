use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::Serialize;

use super::formats::{self, ConfigFormat};
use crate::engine::EngineSettings;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

const FORMAT_EXTENSIONS: [&str; 4] = ["toml", "json", "yaml", "yml"];

/// Layered dirflow settings
///
/// Later layers win:
/// 1. embedded `default-config.toml`
/// 2. `~/.config/dirflow/config.{toml,json,yaml,yml}`
/// 3. `./dirflow.{toml,json,yaml,yml}`
/// 4. an explicit settings file
/// 5. `DIRFLOW_` environment variables, `__` separating nested keys
/// 6. CLI overrides
pub struct DirflowConfig {
    figment: Figment,
}

impl DirflowConfig {
    /// Defaults, user, project and environment layers only
    pub fn load_default() -> Result<Self> {
        Self::load(None, None::<EngineOverrides>)
    }

    pub fn load<T: Serialize>(
        custom_config: Option<&Path>,
        cli_overrides: Option<T>,
    ) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        for ext in FORMAT_EXTENSIONS {
            let user_file = Self::user_config_dir().join(format!("config.{ext}"));
            figment = figment.merge(formats::auto(user_file));
        }
        for ext in FORMAT_EXTENSIONS {
            figment = figment.merge(formats::auto(format!("dirflow.{ext}")));
        }

        if let Some(path) = custom_config {
            tracing::trace!("CONFIG LOAD: Applying settings file {}", path.display());
            figment = figment.merge(formats::auto(path));
        }

        figment = figment.merge(Env::prefixed("DIRFLOW_").split("__"));

        if let Some(overrides) = cli_overrides {
            tracing::trace!("CONFIG LOAD: Applying CLI overrides");
            figment = figment.merge(Serialized::default("engine", overrides));
        }

        Ok(DirflowConfig { figment })
    }

    /// The `[engine]` section as typed settings
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        self.figment
            .extract_inner("engine")
            .context("Invalid [engine] settings")
    }

    /// Every merged layer as one structured value
    pub fn merged(&self) -> Result<serde_json::Value> {
        self.figment
            .extract()
            .context("Failed to merge settings layers")
    }

    /// Render the merged settings in `format`, as shown by `dirflow settings`
    pub fn export(&self, format: ConfigFormat) -> Result<String> {
        format.render(&self.merged()?)
    }

    fn user_config_dir() -> PathBuf {
        match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(".config").join("dirflow"),
            Err(_) => PathBuf::from("~/.config/dirflow"),
        }
    }
}

/// Engine settings given on the command line; unset flags leave lower
/// layers untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_fast: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_links: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respect_ignore_files: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_hidden: Option<bool>,
}

/// Convert a boolean flag into an override that only applies when set
pub(crate) fn flag(set: bool) -> Option<bool> {
    set.then_some(true)
}
