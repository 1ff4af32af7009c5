//! `dirflow run`: walk a tree with a rule file
//!
//! The walk is blocking work, so it runs on tokio's blocking pool while a
//! ctrl-c listener flips the engine's cancel flag.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

use crate::builtins::default_registry;
use crate::cli::Output;
use crate::config::{DirflowConfig, EngineOverrides, flag, load_rule_source};
use crate::engine::{CancelFlag, Engine, RunReport};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory to walk
    #[arg(value_name = "ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Rule file (YAML, JSON or TOML)
    #[arg(short, long, value_name = "FILE")]
    pub rules: PathBuf,

    /// Abort on the first processor failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Deepest node depth allowed below the root
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Descend into symlinked directories
    #[arg(long)]
    pub follow_links: bool,

    /// Skip entries excluded by .gitignore / .ignore files
    #[arg(long)]
    pub respect_ignore: bool,

    /// Skip entries whose name starts with a dot
    #[arg(long)]
    pub no_hidden: bool,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Exit non-zero when any processor failed
    #[arg(long)]
    pub strict: bool,

    /// Print a line per processor call on stderr
    #[arg(long)]
    pub progress: bool,
}

impl RunArgs {
    fn overrides(&self) -> EngineOverrides {
        EngineOverrides {
            fail_fast: flag(self.fail_fast),
            max_depth: self.max_depth,
            follow_links: flag(self.follow_links),
            respect_ignore_files: flag(self.respect_ignore),
            include_hidden: self.no_hidden.then_some(false),
        }
    }
}

pub async fn execute(
    args: RunArgs,
    settings_path: Option<&Path>,
    output: &Output,
) -> Result<()> {
    let config = DirflowConfig::load(settings_path, Some(args.overrides()))?;
    let settings = config.engine_settings()?;
    let source = load_rule_source(&args.rules)?;
    let registry = default_registry();
    let mut engine = Engine::new(&registry, &source, settings)
        .with_context(|| format!("Invalid rule file {}", args.rules.display()))?;
    if args.progress {
        let output = *output;
        engine = engine.with_progress(move |event| {
            let message = format!("{} {} {}", event.phase, event.processor, event.path);
            output.progress(event.current, event.total, &message);
        });
    }

    output.verbose(&format!(
        "{} rules loaded from {}",
        engine.rules().len(),
        args.rules.display()
    ));

    let cancel = CancelFlag::new();
    let listener = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping the walk");
                cancel.cancel();
            }
        })
    };

    let root = args.root.clone();
    let walk_cancel = cancel.clone();
    let outcome =
        tokio::task::spawn_blocking(move || engine.run_with_cancel(&root, &walk_cancel))
            .await
            .context("Traversal task panicked")?;
    listener.abort();
    let report = outcome?;

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report.to_json())?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        print_summary(&report, output);
        if let Some(path) = &args.output {
            output.info(&format!("Report written to {}", path.display()));
        }
    }

    if args.strict && report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(report: &RunReport, output: &Output) {
    output.header(&format!("dirflow run {}", report.context.run_id()));

    for record in report.results() {
        let action = match (&record.processor, &record.path) {
            (Some(processor), Some(path)) => format!("{processor} {path}"),
            (Some(processor), None) => processor.clone(),
            (None, Some(path)) => path.clone(),
            (None, None) => String::from("-"),
        };
        output.action_result(&action, &record.message, !record.is_error());
    }

    output.blank_line();
    output.separator();
    output.summary_stats("Nodes visited", report.nodes_visited);
    output.summary_stats("Results", report.results().len());
    output.summary_stats("Failures", report.failures);
    output.separator();

    let seconds = report.elapsed.as_secs_f64();
    if report.cancelled {
        output.warning(&format!("Run cancelled after {seconds:.2}s"));
    } else if report.has_failures() {
        output.error(&format!(
            "Finished in {seconds:.2}s with {} failed processor calls",
            report.failures
        ));
    } else {
        output.success(&format!("Finished in {seconds:.2}s"));
    }
}
