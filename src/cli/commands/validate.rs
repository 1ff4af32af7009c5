use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::builtins::default_registry;
use crate::cli::Output;
use crate::config::{DirflowConfig, load_rule_source};
use crate::engine::Engine;
use crate::registry::Phase;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Rule file to check
    #[arg(short, long, value_name = "FILE")]
    pub rules: PathBuf,
}

/// Compile the rule file exactly as `run` would, without walking anything
pub async fn execute(
    args: ValidateArgs,
    settings_path: Option<&Path>,
    output: &Output,
) -> Result<()> {
    let settings =
        DirflowConfig::load(settings_path, None::<serde_json::Value>)?.engine_settings()?;
    let source = load_rule_source(&args.rules)?;
    let engine = Engine::new(&default_registry(), &source, settings)
        .with_context(|| format!("Invalid rule file {}", args.rules.display()))?;

    output.success(&format!("{} is valid", args.rules.display()));
    for rule in engine.rules().iter() {
        let counts: Vec<String> = [Phase::Pre, Phase::Inline, Phase::Post]
            .into_iter()
            .map(|phase| format!("{phase} {}", rule.processors(phase).len()))
            .collect();
        output.list_item(&format!(
            "{} (priority {}): {}",
            rule.pattern().as_str(),
            rule.priority,
            counts.join(", ")
        ));
    }
    output.info(&format!(
        "{} rules, {} setup hooks, {} teardown hooks",
        engine.rules().len(),
        source.setup.as_slice().len(),
        source.teardown.as_slice().len()
    ));
    Ok(())
}
