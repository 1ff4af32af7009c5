//! Serde model of a rule file
//!
//! ```yaml
//! setup: [record_to_shared]
//! teardown: run_summary
//! teardown_config:
//!   log_dir: logs
//! rules:
//!   "**/*.txt":
//!     processors: [count_chars]
//!   "**/":
//!     post_processors: [summarize]
//!     priority: 5
//!   "*.md": match_lines        # shorthand: inline processors only
//! ```
//!
//! Patterns may also sit at the top level next to the hook keys; they are
//! appended after the `rules` section in file order. The hook keys accept
//! the aliases `pre_process`, `post_process`, `config_pre` and `config_post`.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::context::Config;
use crate::error::{EngineError, Result};

/// A list of processor names; a single string is accepted as a one-item list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct NameList(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for NameList {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(name) => NameList(vec![name]),
            OneOrMany::Many(names) => NameList(names),
        }
    }
}

impl NameList {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for NameList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        NameList(iter.into_iter().map(Into::into).collect())
    }
}

/// Full form of one rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleSpec {
    #[serde(alias = "pre", skip_serializing_if = "NameList::is_empty")]
    pub pre_processors: NameList,
    #[serde(alias = "inline", skip_serializing_if = "NameList::is_empty")]
    pub processors: NameList,
    #[serde(alias = "post", skip_serializing_if = "NameList::is_empty")]
    pub post_processors: NameList,
    #[serde(skip_serializing_if = "Config::is_empty")]
    pub config: Config,
    #[serde(skip_serializing_if = "is_zero")]
    pub priority: i64,
    #[serde(skip_serializing_if = "is_true")]
    pub enabled: bool,
}

impl Default for RuleSpec {
    fn default() -> Self {
        Self {
            pre_processors: NameList::default(),
            processors: NameList::default(),
            post_processors: NameList::default(),
            config: Config::new(),
            priority: 0,
            enabled: true,
        }
    }
}

impl RuleSpec {
    pub fn pre<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            pre_processors: names.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn inline<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            processors: names.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn post<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            post_processors: names.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

fn is_true(value: &bool) -> bool {
    *value
}

/// One entry of the rule map: the full form, or a shorthand naming inline
/// processors only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    Single(String),
    List(Vec<String>),
    Full(RuleSpec),
}

impl RuleEntry {
    /// Expand shorthands into the full form
    pub fn to_spec(&self) -> RuleSpec {
        match self {
            RuleEntry::Single(name) => RuleSpec {
                processors: NameList(vec![name.clone()]),
                ..RuleSpec::default()
            },
            RuleEntry::List(names) => RuleSpec {
                processors: NameList(names.clone()),
                ..RuleSpec::default()
            },
            RuleEntry::Full(spec) => spec.clone(),
        }
    }
}

impl From<RuleSpec> for RuleEntry {
    fn from(spec: RuleSpec) -> Self {
        RuleEntry::Full(spec)
    }
}

/// Everything a rule file can say
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSource {
    #[serde(alias = "pre_process", skip_serializing_if = "NameList::is_empty")]
    pub setup: NameList,
    #[serde(alias = "post_process", skip_serializing_if = "NameList::is_empty")]
    pub teardown: NameList,
    #[serde(alias = "config_pre", skip_serializing_if = "Config::is_empty")]
    pub setup_config: Config,
    #[serde(alias = "config_post", skip_serializing_if = "Config::is_empty")]
    pub teardown_config: Config,
    #[serde(
        skip_serializing_if = "IndexMap::is_empty",
        deserialize_with = "unique_patterns"
    )]
    pub rules: IndexMap<String, RuleEntry>,
    /// Patterns written at the top level of the file
    #[serde(flatten, deserialize_with = "unique_patterns")]
    pub top_level: IndexMap<String, RuleEntry>,
}

/// Pattern map that rejects a key written twice instead of keeping the last
fn unique_patterns<'de, D>(
    deserializer: D,
) -> std::result::Result<IndexMap<String, RuleEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PatternMap;

    impl<'de> Visitor<'de> for PatternMap {
        type Value = IndexMap<String, RuleEntry>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of glob patterns to rules")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut patterns = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(pattern) = map.next_key::<String>()? {
                if patterns.contains_key(&pattern) {
                    return Err(de::Error::custom(format!("duplicate pattern '{pattern}'")));
                }
                let entry = map.next_value::<RuleEntry>()?;
                patterns.insert(pattern, entry);
            }
            Ok(patterns)
        }
    }

    deserializer.deserialize_map(PatternMap)
}

impl RuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder helper for programmatic tables
    pub fn rule(mut self, pattern: impl Into<String>, spec: RuleSpec) -> Self {
        self.rules.insert(pattern.into(), RuleEntry::Full(spec));
        self
    }

    /// Every pattern in table order. A pattern defined both under `rules`
    /// and at the top level is rejected.
    pub fn entries(&self) -> Result<Vec<(&str, RuleSpec)>> {
        let mut entries = Vec::with_capacity(self.rules.len() + self.top_level.len());
        for (pattern, entry) in self.rules.iter().chain(self.top_level.iter()) {
            if entries.iter().any(|(seen, _)| *seen == pattern.as_str()) {
                return Err(EngineError::RuleSource {
                    origin: "rule table".to_string(),
                    reason: format!("pattern '{pattern}' is defined twice"),
                });
            }
            entries.push((pattern.as_str(), entry.to_spec()));
        }
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.rules.len() + self.top_level.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starter rule table used by `dirflow template`
    pub fn template() -> Self {
        let mut source = RuleSource {
            setup: NameList(vec!["record_to_shared".to_string()]),
            teardown: ["persist_history", "run_summary"].into_iter().collect(),
            ..RuleSource::default()
        };
        source
            .setup_config
            .insert("note".to_string(), json!("run started"));
        source
            .teardown_config
            .insert("log_dir".to_string(), json!("logs"));

        source.rules.insert(
            "**/*.txt".to_string(),
            RuleEntry::Full(RuleSpec {
                processors: ["count_chars", "record_to_shared"].into_iter().collect(),
                config: config_of(&[("bucket", json!("chars"))]),
                ..RuleSpec::default()
            }),
        );
        source.rules.insert(
            "**/".to_string(),
            RuleEntry::Full(RuleSpec {
                post_processors: ["summarize", "propagate"].into_iter().collect(),
                config: config_of(&[("bucket", json!("chars"))]),
                ..RuleSpec::default()
            }),
        );
        source.rules.insert(
            "**/*.log".to_string(),
            RuleEntry::Full(RuleSpec {
                processors: NameList(vec!["match_lines".to_string()]),
                config: config_of(&[("pattern", json!("(?i)error"))]),
                priority: 10,
                ..RuleSpec::default()
            }),
        );
        source
    }
}

fn config_of(pairs: &[(&str, Value)]) -> Config {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_entries() {
        let yaml = r#"
rules:
  "*.md": match_lines
  "*.txt": [count_chars, record_to_shared]
"#;
        let source: RuleSource = serde_yml::from_str(yaml).unwrap();
        let entries = source.entries().unwrap();
        assert_eq!(entries[0].0, "*.md");
        assert_eq!(entries[0].1.processors.as_slice(), ["match_lines"]);
        assert_eq!(
            entries[1].1.processors.as_slice(),
            ["count_chars", "record_to_shared"]
        );
        assert!(entries[1].1.enabled);
    }

    #[test]
    fn test_hook_aliases_and_single_names() {
        let json = r#"{
            "pre_process": "record_to_shared",
            "post_process": ["persist_history"],
            "config_post": {"log_dir": "out"},
            "**/*.txt": {"processors": ["backup_file"], "config": {"backup_dir": "bk"}}
        }"#;
        let source: RuleSource = serde_json::from_str(json).unwrap();
        assert_eq!(source.setup.as_slice(), ["record_to_shared"]);
        assert_eq!(source.teardown.as_slice(), ["persist_history"]);
        assert_eq!(source.teardown_config["log_dir"], "out");

        let entries = source.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "**/*.txt");
        assert_eq!(entries[0].1.config["backup_dir"], "bk");
    }

    #[test]
    fn test_unknown_rule_keys_are_rejected() {
        let json = r#"{"rules": {"*.txt": {"procesors": ["count_chars"]}}}"#;
        assert!(serde_json::from_str::<RuleSource>(json).is_err());
    }

    #[test]
    fn test_duplicate_pattern_across_sections() {
        let json = r#"{"rules": {"*.txt": "a"}, "*.txt": "b"}"#;
        let source: RuleSource = serde_json::from_str(json).unwrap();
        assert!(source.entries().is_err());
    }

    #[test]
    fn test_duplicate_pattern_keys_are_rejected() {
        let json = r#"{"rules": {"*.txt": "a", "*.txt": "b"}}"#;
        let err = serde_json::from_str::<RuleSource>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate pattern '*.txt'"), "{err}");

        let json = r#"{"*.md": "a", "setup": "b", "*.md": "c"}"#;
        let err = serde_json::from_str::<RuleSource>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate pattern '*.md'"), "{err}");
    }

    #[test]
    fn test_template_order_is_stable() {
        let source = RuleSource::template();
        let patterns: Vec<_> = source.rules.keys().map(String::as_str).collect();
        assert_eq!(patterns, vec!["**/*.txt", "**/", "**/*.log"]);
    }
}
