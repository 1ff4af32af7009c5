//! # dirflow
//!
//! Rule-driven directory traversal. A rule table maps glob patterns to named
//! processors; the engine walks a tree depth-first and runs, for every node,
//! the `pre`, `inline` and `post` processors of all matching rules. Processors
//! share one [`ProcessingContext`] for the whole run: a bucket store for
//! hierarchical aggregation, a shared store for run-wide state and an ordered
//! result log.
//!
//! ```no_run
//! use dirflow::{Engine, EngineSettings, RuleSource, RuleSpec, builtins};
//!
//! # fn main() -> dirflow::Result<()> {
//! let registry = builtins::default_registry();
//! let rules = RuleSource::new()
//!     .rule("**/*.txt", RuleSpec::inline(["count_chars"]))
//!     .rule("**/", RuleSpec::post(["summarize", "propagate"]));
//!
//! let engine = Engine::new(&registry, &rules, EngineSettings::default())?;
//! let report = engine.run("data")?;
//! println!("{}", report.to_json());
//! # Ok(())
//! # }
//! ```

pub mod builtins;
pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod registry;
pub mod rules;
pub mod scheduler;

pub use context::{Config, ProcessingContext, ResultRecord, Status};
pub use engine::{
    CancelFlag, Engine, EngineSettings, Node, NodeKind, ProgressEvent, ProgressObserver, RunReport,
};
pub use error::{EngineError, Result};
pub use registry::{Phase, Processor, ProcessorRegistry, Registration};
pub use rules::{RuleSource, RuleSpec, RuleTable};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
