//! Per-node phase execution
//!
//! For one node and one phase the scheduler gathers the processors of every
//! matched rule, sorts them and calls them one after another. Entries are
//! never de-duplicated: a processor listed twice, or reached through two
//! rules, runs twice.
//!
//! Ordering is a stable sort, descending by `(rule priority, registration
//! priority)`. Equal keys keep matched-rule order, then listing order.
//!
//! A processor that returns an error or panics produces exactly one `error`
//! record and the phase carries on, unless the scheduler is fail-fast.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::context::{Config, ProcessingContext, ResultRecord, TraceEntry};
use crate::engine::Node;
use crate::error::{EngineError, Result};
use crate::registry::{Phase, Registration};
use crate::rules::Rule;

/// One planned processor call
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub registration: &'a Arc<Registration>,
    pub config: &'a Config,
    /// Pattern of the contributing rule, or the hook list name
    pub origin: &'a str,
    pub rule_priority: i64,
}

impl Invocation<'_> {
    pub fn name(&self) -> &str {
        &self.registration.name
    }

    fn sort_key(&self) -> (i64, i64) {
        (self.rule_priority, self.registration.priority)
    }
}

/// What happened to one call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed {
        processor: String,
        value: Option<Value>,
    },
    Failed {
        processor: String,
        message: String,
    },
}

impl Outcome {
    pub fn processor(&self) -> &str {
        match self {
            Outcome::Completed { processor, .. } | Outcome::Failed { processor, .. } => processor,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseScheduler {
    fail_fast: bool,
}

impl PhaseScheduler {
    pub fn new(fail_fast: bool) -> Self {
        Self { fail_fast }
    }

    /// Call order for `phase` over the matched rules
    pub fn plan<'a>(&self, phase: Phase, rules: &[&'a Rule]) -> Vec<Invocation<'a>> {
        let mut plan: Vec<Invocation<'a>> = rules
            .iter()
            .flat_map(|&rule| {
                rule.processors(phase).iter().map(move |registration| Invocation {
                    registration,
                    config: &rule.config,
                    origin: rule.pattern().as_str(),
                    rule_priority: rule.priority,
                })
            })
            .collect();

        // sort_by is stable
        plan.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        plan
    }

    /// Run one per-node phase
    pub fn run_phase(
        &self,
        phase: Phase,
        rules: &[&Rule],
        node: &Node,
        ctx: &mut ProcessingContext,
    ) -> Result<Vec<Outcome>> {
        self.run_phase_with(phase, rules, node, ctx, &mut |_| {})
    }

    /// [`run_phase`](Self::run_phase), calling `on_call` right before each
    /// processor runs
    pub fn run_phase_with(
        &self,
        phase: Phase,
        rules: &[&Rule],
        node: &Node,
        ctx: &mut ProcessingContext,
        on_call: &mut dyn FnMut(&Invocation<'_>),
    ) -> Result<Vec<Outcome>> {
        let plan = self.plan(phase, rules);
        self.execute(phase, &plan, node, ctx, on_call)
    }

    /// Run a hook list in listed order with one shared config mapping
    pub fn run_hooks(
        &self,
        phase: Phase,
        hooks: &[Arc<Registration>],
        config: &Config,
        node: &Node,
        ctx: &mut ProcessingContext,
    ) -> Result<Vec<Outcome>> {
        self.run_hooks_with(phase, hooks, config, node, ctx, &mut |_| {})
    }

    pub fn run_hooks_with(
        &self,
        phase: Phase,
        hooks: &[Arc<Registration>],
        config: &Config,
        node: &Node,
        ctx: &mut ProcessingContext,
        on_call: &mut dyn FnMut(&Invocation<'_>),
    ) -> Result<Vec<Outcome>> {
        let plan: Vec<Invocation<'_>> = hooks
            .iter()
            .map(|registration| Invocation {
                registration,
                config,
                origin: phase.as_str(),
                rule_priority: 0,
            })
            .collect();
        self.execute(phase, &plan, node, ctx, on_call)
    }

    fn execute(
        &self,
        phase: Phase,
        plan: &[Invocation<'_>],
        node: &Node,
        ctx: &mut ProcessingContext,
        on_call: &mut dyn FnMut(&Invocation<'_>),
    ) -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::with_capacity(plan.len());

        for invocation in plan {
            on_call(invocation);
            let name = invocation.name();
            debug!(%phase, path = node.key(), processor = name, "invoking");

            let processor = &invocation.registration.processor;
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                processor.process(node, ctx, invocation.config)
            }));

            let outcome = match result {
                Ok(Ok(value)) => {
                    if let Some(value) = &value {
                        ctx.push_result(
                            ResultRecord::ok(format!("{name} completed"))
                                .with_phase(phase)
                                .with_processor(name)
                                .with_path(node.key())
                                .with_field("result", value.clone()),
                        );
                    }
                    Outcome::Completed {
                        processor: name.to_string(),
                        value,
                    }
                }
                Ok(Err(e)) => Outcome::Failed {
                    processor: name.to_string(),
                    message: format!("{e:#}"),
                },
                Err(payload) => Outcome::Failed {
                    processor: name.to_string(),
                    message: format!("panicked: {}", panic_message(payload.as_ref())),
                },
            };

            ctx.record_call(TraceEntry {
                phase,
                path: node.key().to_string(),
                processor: name.to_string(),
                succeeded: !outcome.is_failure(),
            });

            if let Outcome::Failed { message, .. } = &outcome {
                warn!(%phase, path = node.key(), processor = name, "processor failed: {message}");
                ctx.push_result(
                    ResultRecord::error(message.clone())
                        .with_phase(phase)
                        .with_processor(name)
                        .with_path(node.key())
                        .with_field("rule", Value::from(invocation.origin)),
                );

                if self.fail_fast {
                    return Err(EngineError::ProcessorFailed {
                        processor: name.to_string(),
                        phase,
                        path: node.key().to_string(),
                        message: message.clone(),
                    });
                }
            }

            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
