use std::fmt;
use std::path::Path;

use anyhow::Result;
use figment::providers::{Format, Json, Toml, Yaml};
use serde::Serialize;
use tracing::debug;

/// File formats understood by the settings and rule loaders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Format implied by the file extension, if any
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "json" => Some(ConfigFormat::Json),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            _ => None,
        }
    }

    /// Guess the format from file content
    pub fn detect(content: &str) -> Option<Self> {
        let trimmed = content.trim();

        if (trimmed.starts_with('{') && trimmed.ends_with('}'))
            || (trimmed.starts_with('[') && trimmed.ends_with(']') && !trimmed.contains('\n'))
        {
            return Some(ConfigFormat::Json);
        }

        // key/value with `=` or a [table] header
        if trimmed.lines().any(|line| {
            let line = line.trim();
            (line.starts_with('[') && line.ends_with(']'))
                || (line.contains('=') && !line.contains(':'))
        }) {
            return Some(ConfigFormat::Toml);
        }

        if trimmed.starts_with("---")
            || trimmed.lines().any(|line| {
                let line = line.trim();
                line.contains(':') && !line.starts_with('[') && !line.starts_with('#')
            })
        {
            return Some(ConfigFormat::Yaml);
        }

        None
    }

    /// Extension first, content second, TOML last
    pub fn resolve(path: &Path, content: &str) -> Self {
        Self::from_path(path)
            .or_else(|| {
                let detected = Self::detect(content);
                debug!(path = %path.display(), ?detected, "detected format from content");
                detected
            })
            .unwrap_or(ConfigFormat::Toml)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Yaml => "yaml",
        }
    }

    /// Serialize any value in this format
    pub fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        let output = match self {
            ConfigFormat::Json => serde_json::to_string_pretty(value)?,
            ConfigFormat::Toml => toml::to_string_pretty(value)?,
            ConfigFormat::Yaml => serde_yml::to_string(value)?,
        };
        Ok(output)
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Figment provider for a settings file of any supported format
pub fn auto<P: AsRef<Path>>(path: P) -> impl figment::Provider {
    let path = path.as_ref();
    let format = match ConfigFormat::from_path(path) {
        Some(format) => format,
        None => std::fs::read_to_string(path)
            .map(|content| ConfigFormat::resolve(path, &content))
            .unwrap_or(ConfigFormat::Toml),
    };

    match format {
        ConfigFormat::Toml => SmartProvider::Toml(Toml::file(path)),
        ConfigFormat::Json => SmartProvider::Json(Json::file(path)),
        ConfigFormat::Yaml => SmartProvider::Yaml(Yaml::file(path)),
    }
}

enum SmartProvider {
    Toml(figment::providers::Data<Toml>),
    Json(figment::providers::Data<Json>),
    Yaml(figment::providers::Data<Yaml>),
}

impl figment::Provider for SmartProvider {
    fn metadata(&self) -> figment::Metadata {
        match self {
            SmartProvider::Toml(p) => p.metadata(),
            SmartProvider::Json(p) => p.metadata(),
            SmartProvider::Yaml(p) => p.metadata(),
        }
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        match self {
            SmartProvider::Toml(p) => p.data(),
            SmartProvider::Json(p) => p.data(),
            SmartProvider::Yaml(p) => p.data(),
        }
    }
}
