//! Depth-first traversal engine
//!
//! A run brackets the walk with the `setup` and `teardown` hook lists and
//! visits every node in this order:
//!
//! ```text
//! file:       pre -> inline -> post
//! directory:  pre -> inline -> children -> post
//! ```
//!
//! Children are visited one at a time, each finishing its whole phase
//! sequence before the next sibling starts. Teardown always runs, also after
//! cancellation and fatal errors.
//!
//! An observer installed with [`Engine::with_progress`] is told about every
//! processor call right before it runs. Its `total` comes from a dry listing
//! of the tree taken when the run starts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::context::{Config, ProcessingContext, ResultRecord};
use crate::error::{EngineError, Result};
use crate::registry::{Phase, ProcessorRegistry, Registration};
use crate::rules::{RuleSource, RuleTable, resolve_names};
use crate::scheduler::{Invocation, PhaseScheduler};

mod lister;
mod node;
mod settings;

pub use lister::{DirectoryLister, IgnoreLister, ListedEntry, WalkdirLister};
pub use node::{Node, NodeKind};
pub use settings::EngineSettings;

/// Cooperative cancellation shared between the walk and whoever stops it
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a finished run hands back
#[derive(Debug)]
pub struct RunReport {
    pub context: ProcessingContext,
    pub nodes_visited: usize,
    /// Number of error records in the result log
    pub failures: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn results(&self) -> &[ResultRecord] {
        self.context.results()
    }

    pub fn has_failures(&self) -> bool {
        self.failures > 0
    }

    /// Full machine-readable report
    pub fn to_json(&self) -> Value {
        json!({
            "run_id": self.context.run_id().to_string(),
            "root": self.context.root().display().to_string(),
            "nodes_visited": self.nodes_visited,
            "failures": self.failures,
            "cancelled": self.cancelled,
            "elapsed_ms": self.elapsed.as_millis() as u64,
            "results": self.context.results(),
            "shared": self.context.shared_store(),
            "buckets": self.context.buckets(),
        })
    }
}

/// One processor call about to run
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// 1-based position of the call within the run
    pub current: usize,
    /// Calls planned for the whole run; fail-fast and cancellation end early
    pub total: usize,
    pub phase: Phase,
    pub path: String,
    pub processor: String,
}

impl ProgressEvent {
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            (self.current * 100 / self.total).min(100)
        }
    }
}

pub type ProgressObserver = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

struct Hooks {
    setup: Vec<Arc<Registration>>,
    setup_config: Config,
    teardown: Vec<Arc<Registration>>,
    teardown_config: Config,
}

pub struct Engine {
    table: RuleTable,
    hooks: Hooks,
    settings: EngineSettings,
    scheduler: PhaseScheduler,
    lister: Box<dyn DirectoryLister>,
    progress: Option<ProgressObserver>,
}

impl Engine {
    /// Compile the rule source against `registry`. Every configuration error
    /// surfaces here, before any node is visited.
    pub fn new(
        registry: &ProcessorRegistry,
        source: &RuleSource,
        settings: EngineSettings,
    ) -> Result<Self> {
        let table = RuleTable::compile(source, registry)?;
        let hooks = Hooks {
            setup: resolve_names(registry, source.setup.as_slice(), Phase::Setup, "setup")?,
            setup_config: source.setup_config.clone(),
            teardown: resolve_names(
                registry,
                source.teardown.as_slice(),
                Phase::Teardown,
                "teardown",
            )?,
            teardown_config: source.teardown_config.clone(),
        };

        Ok(Self {
            table,
            hooks,
            scheduler: PhaseScheduler::new(settings.fail_fast),
            lister: settings.lister(),
            settings,
            progress: None,
        })
    }

    /// Replace the child lister (ordering, filtering, virtual trees)
    pub fn with_lister(mut self, lister: impl DirectoryLister + 'static) -> Self {
        self.lister = Box::new(lister);
        self
    }

    /// Report each processor call to `observer` as the run goes
    pub fn with_progress(
        mut self,
        observer: impl Fn(&ProgressEvent) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(observer));
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.table
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn run(&self, root: impl AsRef<Path>) -> Result<RunReport> {
        self.run_with_cancel(root, &CancelFlag::new())
    }

    pub fn run_with_cancel(
        &self,
        root: impl AsRef<Path>,
        cancel: &CancelFlag,
    ) -> Result<RunReport> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(EngineError::RootNotFound(root.to_path_buf()));
        }

        let started = Instant::now();
        let mut ctx = ProcessingContext::new(root);
        let root_node = Node::root(root);
        info!(run_id = %ctx.run_id(), root = %root.display(), "starting run");

        let progress = self.progress.as_ref().map(|observer| Progress {
            observer,
            total: self.planned_calls(&root_node),
            calls: 0,
        });
        let mut walk = Walk {
            engine: self,
            cancel,
            open: Vec::new(),
            visited: 0,
            cancelled: false,
            progress,
        };

        let mut walked = self
            .scheduler
            .run_hooks_with(
                Phase::Setup,
                &self.hooks.setup,
                &self.hooks.setup_config,
                &root_node,
                &mut ctx,
                &mut |call| walk.notify(Phase::Setup, &root_node, call),
            )
            .map(drop);
        if walked.is_ok() {
            walked = walk.visit(&root_node, &mut ctx);
        }

        let teardown = self.scheduler.run_hooks_with(
            Phase::Teardown,
            &self.hooks.teardown,
            &self.hooks.teardown_config,
            &root_node,
            &mut ctx,
            &mut |call| walk.notify(Phase::Teardown, &root_node, call),
        );

        if let Err(e) = &walked {
            warn!("run aborted: {e}");
        }
        walked?;
        teardown?;

        let report = RunReport {
            failures: ctx.error_count(),
            nodes_visited: walk.visited,
            cancelled: walk.cancelled,
            elapsed: started.elapsed(),
            context: ctx,
        };
        info!(
            nodes = report.nodes_visited,
            failures = report.failures,
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "run finished"
        );
        Ok(report)
    }

    /// Processor calls a run over `root` would make, from a dry listing that
    /// skips the same entries the walk skips
    fn planned_calls(&self, root: &Node) -> usize {
        let hooks = self.hooks.setup.len() + self.hooks.teardown.len();
        hooks + self.planned_node_calls(root, &mut Vec::new())
    }

    fn planned_node_calls(&self, node: &Node, open: &mut Vec<PathBuf>) -> usize {
        if node.depth > self.settings.max_depth {
            return 0;
        }
        let canonical = if node.is_dir() {
            let canonical = fs::canonicalize(&node.path).unwrap_or_else(|_| node.path.clone());
            if open.contains(&canonical) {
                return 0;
            }
            Some(canonical)
        } else {
            None
        };

        let mut calls: usize = self
            .table
            .resolve(&node.rel_path, node.is_dir())
            .iter()
            .flat_map(|rule| Phase::NODE.map(|phase| rule.processors(phase).len()))
            .sum();

        if let Some(canonical) = canonical {
            let Ok(entries) = self.lister.list(&node.path) else {
                return calls;
            };
            open.push(canonical);
            for entry in entries {
                if !self.settings.include_hidden && entry.is_hidden() {
                    continue;
                }
                calls += self.planned_node_calls(&node.child(&entry.file_name, entry.kind), open);
            }
            open.pop();
        }
        calls
    }
}

/// Observer plus the running call count
struct Progress<'a> {
    observer: &'a ProgressObserver,
    total: usize,
    calls: usize,
}

/// State of one depth-first walk
struct Walk<'a> {
    engine: &'a Engine,
    cancel: &'a CancelFlag,
    /// Canonical paths of the directories currently being visited
    open: Vec<PathBuf>,
    visited: usize,
    cancelled: bool,
    progress: Option<Progress<'a>>,
}

impl Walk<'_> {
    fn notify(&mut self, phase: Phase, node: &Node, call: &Invocation<'_>) {
        let Some(progress) = self.progress.as_mut() else {
            return;
        };
        progress.calls += 1;
        (progress.observer)(&ProgressEvent {
            current: progress.calls,
            total: progress.total.max(progress.calls),
            phase,
            path: node.key().to_string(),
            processor: call.name().to_string(),
        });
    }

    fn visit(&mut self, node: &Node, ctx: &mut ProcessingContext) -> Result<()> {
        if self.cancel.is_cancelled() {
            if !self.cancelled {
                info!(path = node.key(), "run cancelled");
            }
            self.cancelled = true;
            return Ok(());
        }

        let limit = self.engine.settings.max_depth;
        if node.depth > limit {
            return Err(EngineError::DepthLimit {
                path: node.path.clone(),
                limit,
            });
        }

        let canonical = if node.is_dir() {
            let canonical = fs::canonicalize(&node.path).unwrap_or_else(|_| node.path.clone());
            if let Some(ancestor) = self.open.iter().find(|open| **open == canonical) {
                return Err(EngineError::CycleDetected {
                    path: node.path.clone(),
                    ancestor: ancestor.clone(),
                });
            }
            Some(canonical)
        } else {
            None
        };

        self.visited += 1;
        debug!(path = node.key(), kind = node.kind.as_str(), depth = node.depth, "visiting");

        let engine = self.engine;
        let rules = engine.table.resolve(&node.rel_path, node.is_dir());
        for phase in [Phase::Pre, Phase::Inline] {
            engine.scheduler.run_phase_with(phase, &rules, node, ctx, &mut |call| {
                self.notify(phase, node, call)
            })?;
        }

        if let Some(canonical) = canonical {
            let entries = match engine.lister.list(&node.path) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = node.key(), "cannot list directory: {e}");
                    ctx.push_result(
                        ResultRecord::error(format!("cannot list directory: {e}"))
                            .with_path(node.key()),
                    );
                    return Ok(());
                }
            };

            self.open.push(canonical);
            for entry in entries {
                if !engine.settings.include_hidden && entry.is_hidden() {
                    continue;
                }
                self.visit(&node.child(&entry.file_name, entry.kind), ctx)?;
                if self.cancelled {
                    break;
                }
            }
            self.open.pop();

            if self.cancelled {
                return Ok(());
            }
        }

        engine
            .scheduler
            .run_phase_with(Phase::Post, &rules, node, ctx, &mut |call| {
                self.notify(Phase::Post, node, call)
            })?;
        Ok(())
    }
}
