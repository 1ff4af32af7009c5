//! `dirflow processors`: list what rule files can name

use anyhow::Result;
use clap::Args;

use crate::builtins::default_registry;
use crate::cli::Output;

#[derive(Args, Debug, Default)]
pub struct ProcessorsArgs {
    /// Print the catalog as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ProcessorsArgs, output: &Output) -> Result<()> {
    let catalog = default_registry().catalog();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    output.header("Registered processors");
    for info in &catalog {
        let phases: Vec<&str> = info.phases.iter().map(|p| p.as_str()).collect();
        output.category(&info.name);
        output.key_value("phases:", &phases.join(", "), false);
        output.key_value("priority:", &info.priority.to_string(), false);
        output.key_value("source:", &info.source, false);
        if !info.description.is_empty() {
            output.key_value("about:", &info.description, false);
        }
    }
    output.blank_line();
    output.info(&format!("{} processors available", catalog.len()));
    Ok(())
}
