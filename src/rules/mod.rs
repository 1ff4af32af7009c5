//! Rule table: ordered pattern to rule mapping
//!
//! Compiling a [`RuleSource`] parses every pattern and resolves every
//! processor name against a [`ProcessorRegistry`], so a bad table fails
//! before the first node is touched. Resolution is additive: a path gets
//! every rule whose pattern matches it, in table order.

use std::sync::Arc;

use tracing::debug;

use crate::context::Config;
use crate::error::{EngineError, Result};
use crate::matcher::Pattern;
use crate::registry::{Phase, ProcessorRegistry, Registration};

mod source;

pub use source::{NameList, RuleEntry, RuleSource, RuleSpec};

/// A compiled rule
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Pattern,
    pub priority: i64,
    pub config: Config,
    pre: Vec<Arc<Registration>>,
    inline: Vec<Arc<Registration>>,
    post: Vec<Arc<Registration>>,
    index: usize,
}

impl Rule {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Position in the table
    pub fn index(&self) -> usize {
        self.index
    }

    /// Processors listed for a per-node phase, in listing order. Hook phases
    /// have no per-rule lists.
    pub fn processors(&self, phase: Phase) -> &[Arc<Registration>] {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Inline => &self.inline,
            Phase::Post => &self.post,
            Phase::Setup | Phase::Teardown => &[],
        }
    }

    pub fn matches(&self, rel_path: &str, is_dir: bool) -> bool {
        self.pattern.matches(rel_path, is_dir)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn compile(source: &RuleSource, registry: &ProcessorRegistry) -> Result<Self> {
        let mut rules = Vec::new();

        for (pattern, spec) in source.entries()? {
            if !spec.enabled {
                debug!(pattern, "skipping disabled rule");
                continue;
            }

            let resolve = |names: &NameList, phase: Phase| {
                resolve_names(registry, names.as_slice(), phase, pattern)
            };
            let rule = Rule {
                pattern: Pattern::parse(pattern)?,
                priority: spec.priority,
                pre: resolve(&spec.pre_processors, Phase::Pre)?,
                inline: resolve(&spec.processors, Phase::Inline)?,
                post: resolve(&spec.post_processors, Phase::Post)?,
                config: spec.config,
                index: rules.len(),
            };
            rules.push(rule);
        }

        debug!(rules = rules.len(), "compiled rule table");
        Ok(Self { rules })
    }

    /// Every rule matching the path, in table order
    pub fn resolve(&self, rel_path: &str, is_dir: bool) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(rel_path, is_dir))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

/// Look up `names` for use in `phase`. `owner` names the rule or hook list
/// in error messages.
pub(crate) fn resolve_names(
    registry: &ProcessorRegistry,
    names: &[String],
    phase: Phase,
    owner: &str,
) -> Result<Vec<Arc<Registration>>> {
    names
        .iter()
        .map(|name| {
            let registration = registry
                .get(name)
                .ok_or_else(|| EngineError::UnknownProcessor {
                    name: name.clone(),
                    rule: owner.to_string(),
                    phase,
                })?;
            if !registration.supports(phase) {
                return Err(EngineError::PhaseMismatch {
                    name: name.clone(),
                    rule: owner.to_string(),
                    phase,
                });
            }
            Ok(Arc::clone(registration))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        for name in ["a", "b", "c"] {
            registry.register(Registration::new(name, |_, _, _| Ok(None)));
        }
        registry.register(
            Registration::new("final", |_, _, _| Ok(None)).phases(&[Phase::Teardown]),
        );
        registry
    }

    fn inline(names: &[&str]) -> RuleSpec {
        RuleSpec {
            processors: names.iter().copied().collect(),
            ..RuleSpec::default()
        }
    }

    fn patterns<'a>(rules: &[&'a Rule]) -> Vec<&'a str> {
        rules.iter().map(|r| r.pattern().as_str()).collect()
    }

    #[test]
    fn test_resolution_is_additive_and_ordered() {
        let source = RuleSource::new()
            .rule(".", inline(&["a"]))
            .rule("**/", inline(&["b"]))
            .rule("data/**/", inline(&["c"]));
        let table = RuleTable::compile(&source, &registry()).unwrap();

        assert_eq!(patterns(&table.resolve("data", true)), vec!["**/", "data/**/"]);
        assert_eq!(patterns(&table.resolve("", true)), vec![".", "**/"]);
        assert_eq!(
            patterns(&table.resolve("data/x", true)),
            vec!["**/", "data/**/"]
        );
        assert!(table.resolve("data/x.txt", false).is_empty());
    }

    #[test]
    fn test_unknown_processor_fails_compile() {
        let source = RuleSource::new().rule("*.txt", inline(&["a", "missing"]));
        let err = RuleTable::compile(&source, &registry()).unwrap_err();
        match err {
            EngineError::UnknownProcessor { name, rule, phase } => {
                assert_eq!(name, "missing");
                assert_eq!(rule, "*.txt");
                assert_eq!(phase, Phase::Inline);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_phase_mismatch_fails_compile() {
        let source = RuleSource::new().rule("*.txt", inline(&["final"]));
        let err = RuleTable::compile(&source, &registry()).unwrap_err();
        assert!(matches!(err, EngineError::PhaseMismatch { .. }));
    }

    #[test]
    fn test_invalid_pattern_fails_compile() {
        let source = RuleSource::new().rule("[oops", inline(&["a"]));
        let err = RuleTable::compile(&source, &registry()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPattern { .. }));
    }

    #[test]
    fn test_disabled_rules_are_dropped() {
        let disabled = RuleSpec {
            enabled: false,
            ..inline(&["missing"])
        };
        let source = RuleSource::new()
            .rule("*.log", disabled)
            .rule("*.txt", inline(&["a"]));
        let table = RuleTable::compile(&source, &registry()).unwrap();

        assert_eq!(table.len(), 1);
        assert!(table.resolve("x.log", false).is_empty());
        assert_eq!(table.iter().next().map(Rule::index), Some(0));
    }

    #[test]
    fn test_duplicates_within_a_list_are_kept() {
        let source = RuleSource::new().rule("*.txt", inline(&["a", "a"]));
        let table = RuleTable::compile(&source, &registry()).unwrap();
        let rules = table.resolve("x.txt", false);
        assert_eq!(rules[0].processors(Phase::Inline).len(), 2);
        assert!(rules[0].processors(Phase::Setup).is_empty());
    }
}
