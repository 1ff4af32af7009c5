//! Rule file loading
//!
//! Rule files are parsed straight into [`RuleSource`] so the pattern order
//! written in the file is the table order.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use super::formats::ConfigFormat;
use crate::error::{self, EngineError};
use crate::rules::RuleSource;

const TEMPLATE_HEADER: &str = "\
dirflow rule file

setup / teardown      processors run once before and after the walk
setup_config / ...    config mapping passed to those hooks
rules                 pattern -> {pre_processors, processors, post_processors,
                      config, priority, enabled}

Patterns: '.' is the root, a trailing '/' matches directories only, '*' and
'?' stay within one path segment, '**' spans any number of segments.
Run `dirflow processors` to list the available processor names.
";

/// Read and parse a rule file. The format comes from the extension, or from
/// the content when the extension is unknown.
pub fn load_rule_source(path: &Path) -> error::Result<RuleSource> {
    let content = fs::read_to_string(path).map_err(|e| EngineError::RuleSource {
        origin: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let format = ConfigFormat::resolve(path, &content);
    parse_rule_source(&content, format, &path.display().to_string())
}

pub fn parse_rule_source(
    content: &str,
    format: ConfigFormat,
    origin: &str,
) -> error::Result<RuleSource> {
    if content.trim().is_empty() {
        return Ok(RuleSource::default());
    }

    let parsed = match format {
        ConfigFormat::Yaml => serde_yml::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    };

    parsed.map_err(|reason| EngineError::RuleSource {
        origin: origin.to_string(),
        reason,
    })
}

/// Starter rule file in `format`, commented where the format allows it
pub fn render_template(format: ConfigFormat) -> Result<String> {
    let body = format.render(&RuleSource::template())?;
    let output = match format {
        ConfigFormat::Json => body,
        ConfigFormat::Toml | ConfigFormat::Yaml => {
            let mut commented: String = TEMPLATE_HEADER
                .lines()
                .map(|line| {
                    if line.is_empty() {
                        "#\n".to_string()
                    } else {
                        format!("# {line}\n")
                    }
                })
                .collect();
            commented.push('\n');
            commented.push_str(&body);
            commented
        }
    };
    Ok(output)
}

/// Write the starter rule file to `path`; YAML unless the extension says
/// otherwise. Refuses to overwrite unless `force` is set.
pub fn write_template(path: &Path, force: bool) -> Result<ConfigFormat> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let format = ConfigFormat::from_path(path).unwrap_or(ConfigFormat::Yaml);
    let content = render_template(format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_keeps_pattern_order() {
        let yaml = r#"
rules:
  "zeta/**": [a]
  "alpha/*.txt": [b]
  "mid/": [c]
"#;
        let source = parse_rule_source(yaml, ConfigFormat::Yaml, "inline").unwrap();
        let patterns: Vec<_> = source.rules.keys().map(String::as_str).collect();
        assert_eq!(patterns, vec!["zeta/**", "alpha/*.txt", "mid/"]);
    }

    #[test]
    fn test_toml_rules() {
        let toml = r#"
setup = "record_to_shared"

[rules."**/*.txt"]
processors = ["count_chars"]
priority = 3

[rules."**/"]
post_processors = ["summarize", "propagate"]
"#;
        let source = parse_rule_source(toml, ConfigFormat::Toml, "inline").unwrap();
        let entries = source.entries().unwrap();
        assert_eq!(entries[0].0, "**/*.txt");
        assert_eq!(entries[0].1.priority, 3);
        assert_eq!(entries[1].1.post_processors.as_slice(), ["summarize", "propagate"]);
        assert_eq!(source.setup.as_slice(), ["record_to_shared"]);
    }

    #[test]
    fn test_parse_errors_name_the_origin() {
        let err = parse_rule_source("rules: [", ConfigFormat::Yaml, "broken.yaml").unwrap_err();
        assert!(
            matches!(err, EngineError::RuleSource { ref origin, .. } if origin == "broken.yaml")
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_json_patterns_are_a_rule_source_error() {
        let json = r#"{"rules": {"**/*.txt": "count_chars", "**/*.txt": "match_lines"}}"#;
        let err = parse_rule_source(json, ConfigFormat::Json, "dup.json").unwrap_err();
        match err {
            EngineError::RuleSource { origin, reason } => {
                assert_eq!(origin, "dup.json");
                assert!(reason.contains("duplicate pattern '**/*.txt'"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_file_is_an_empty_table() {
        let source = parse_rule_source("\n", ConfigFormat::Yaml, "empty").unwrap();
        assert!(source.is_empty());
    }

    #[test]
    fn test_load_detects_format_without_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules");
        fs::write(&path, r#"{"rules": {"*.txt": "count_chars"}}"#).unwrap();

        let source = load_rule_source(&path).unwrap();
        assert_eq!(source.len(), 1);
        assert!(load_rule_source(&dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_templates_parse_back_in_every_format() {
        let dir = TempDir::new().unwrap();
        for name in ["rules.yaml", "rules.json", "rules.toml"] {
            let path = dir.path().join(name);
            write_template(&path, false).unwrap();
            let source = load_rule_source(&path).unwrap();
            assert_eq!(source, RuleSource::template(), "{name}");
        }

        let path = dir.path().join("rules.yaml");
        assert!(write_template(&path, false).is_err());
        assert!(write_template(&path, true).is_ok());
        assert!(fs::read_to_string(&path).unwrap().starts_with("# dirflow rule file"));
    }
}
