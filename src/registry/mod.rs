//! Processor registry
//!
//! Processors are registered by name together with the phases they may run
//! in, a default priority and some descriptive metadata. The registry is an
//! explicit value: build one, fill it, hand it to [`Engine::new`] by
//! reference. Rule tables resolve names once at compile time and keep their
//! own `Arc<Registration>` handles, so re-registering a name later never
//! changes a table that is already built.
//!
//! [`Engine::new`]: crate::engine::Engine::new

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::context::{Config, ProcessingContext};
use crate::engine::Node;

pub mod retry;

pub use retry::{RetryPolicy, with_retry};

/// Lifecycle position a processor runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Once per run, before the root is visited
    Setup,
    /// Before a node's children
    Pre,
    /// On the node itself
    Inline,
    /// After a node's subtree
    Post,
    /// Once per run, after the root's post phase
    Teardown,
}

impl Phase {
    /// The three per-node phases in execution order
    pub const NODE: [Phase; 3] = [Phase::Pre, Phase::Inline, Phase::Post];

    pub const ALL: [Phase; 5] = [
        Phase::Setup,
        Phase::Pre,
        Phase::Inline,
        Phase::Post,
        Phase::Teardown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Pre => "pre",
            Phase::Inline => "inline",
            Phase::Post => "post",
            Phase::Teardown => "teardown",
        }
    }

    /// True for the run-level hook phases
    pub fn is_hook(&self) -> bool {
        matches!(self, Phase::Setup | Phase::Teardown)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named operation invoked on a node
///
/// Returning `Ok(Some(value))` appends an `ok` record carrying `value` to the
/// result log; `Ok(None)` appends nothing. An `Err` becomes one `error`
/// record. Processors may also push records themselves.
pub trait Processor: Send + Sync {
    fn process(
        &self,
        node: &Node,
        ctx: &mut ProcessingContext,
        config: &Config,
    ) -> anyhow::Result<Option<Value>>;
}

impl<F> Processor for F
where
    F: Fn(&Node, &mut ProcessingContext, &Config) -> anyhow::Result<Option<Value>> + Send + Sync,
{
    fn process(
        &self,
        node: &Node,
        ctx: &mut ProcessingContext,
        config: &Config,
    ) -> anyhow::Result<Option<Value>> {
        self(node, ctx, config)
    }
}

/// A processor plus everything the registry knows about it
#[derive(Clone)]
pub struct Registration {
    pub name: String,
    pub processor: Arc<dyn Processor>,
    pub phases: Vec<Phase>,
    pub priority: i64,
    pub source: String,
    pub description: String,
    pub metadata: Map<String, Value>,
}

impl Registration {
    /// Register a closure. Defaults: the per-node phases, priority 0,
    /// source `user`.
    pub fn new<F>(name: impl Into<String>, processor: F) -> Self
    where
        F: Fn(&Node, &mut ProcessingContext, &Config) -> anyhow::Result<Option<Value>>
            + Send
            + Sync
            + 'static,
    {
        Self::from_processor(name, Arc::new(processor))
    }

    pub fn from_processor(name: impl Into<String>, processor: Arc<dyn Processor>) -> Self {
        Self {
            name: name.into(),
            processor,
            phases: Phase::NODE.to_vec(),
            priority: 0,
            source: "user".to_string(),
            description: String::new(),
            metadata: Map::new(),
        }
    }

    pub fn phases(mut self, phases: &[Phase]) -> Self {
        self.phases = phases.to_vec();
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Wrap the processor in a retry loop
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.processor = with_retry(self.processor, policy);
        self
    }

    pub fn supports(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("phases", &self.phases)
            .field("priority", &self.priority)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Serializable view of a registration, used for listings
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorInfo {
    pub name: String,
    pub phases: Vec<Phase>,
    pub priority: i64,
    pub source: String,
    pub description: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Name to registration mapping, in registration order
#[derive(Debug, Default, Clone)]
pub struct ProcessorRegistry {
    entries: IndexMap<String, Arc<Registration>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration. An existing entry with the same name is replaced
    /// and returned.
    pub fn register(&mut self, registration: Registration) -> Option<Arc<Registration>> {
        let name = registration.name.clone();
        let previous = self.entries.insert(name.clone(), Arc::new(registration));
        if let Some(old) = &previous {
            warn!(
                processor = %name,
                previous_source = %old.source,
                "processor re-registered, replacing previous entry"
            );
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Registration>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<Registration>> {
        self.entries.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Registration>> {
        self.entries.values()
    }

    /// Descriptions of every registration, in registration order
    pub fn catalog(&self) -> Vec<ProcessorInfo> {
        self.entries
            .values()
            .map(|r| ProcessorInfo {
                name: r.name.clone(),
                phases: r.phases.clone(),
                priority: r.priority,
                source: r.source.clone(),
                description: r.description.clone(),
                metadata: r.metadata.clone(),
            })
            .collect()
    }
}
