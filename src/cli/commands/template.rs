use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::Output;
use crate::config::write_template;

#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Where to write the rule file; the extension picks the format
    #[arg(value_name = "PATH", default_value = "dirflow-rules.yaml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

pub async fn execute(args: TemplateArgs, output: &Output) -> Result<()> {
    let format = write_template(&args.path, args.force)?;
    output.success(&format!(
        "Wrote {} rule template to {}",
        format,
        args.path.display()
    ));
    output.info(&format!(
        "Try it with: dirflow run . --rules {}",
        args.path.display()
    ));
    Ok(())
}
