use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use crate::cli::Output;

pub mod processors;
pub mod run;
pub mod settings;
pub mod template;
pub mod validate;
pub mod version;

#[derive(Parser)]
#[command(
    name = "dirflow",
    version = env!("CARGO_PKG_VERSION"),
    about = "Rule-driven directory traversal with pre/inline/post processor phases",
    long_about = "dirflow walks a directory tree depth-first and runs named processors on \
                  every file and directory matched by the glob patterns of a rule file."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Engine settings file layered over the defaults
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the registered processors
    Processors(processors::ProcessorsArgs),
    /// Walk a directory tree applying a rule file
    Run(run::RunArgs),
    /// Print the merged engine settings
    Settings(settings::SettingsArgs),
    /// Write a starter rule file
    Template(template::TemplateArgs),
    /// Check a rule file against the registered processors
    Validate(validate::ValidateArgs),
    /// Show version information
    Version,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.verbose > 0, self.quiet);

        match self.command {
            Some(Commands::Processors(args)) => processors::execute(args, &output).await,
            Some(Commands::Run(args)) => {
                run::execute(args, self.settings.as_deref(), &output).await
            }
            Some(Commands::Settings(args)) => {
                settings::execute(args, self.settings.as_deref(), &output).await
            }
            Some(Commands::Template(args)) => template::execute(args, &output).await,
            Some(Commands::Validate(args)) => {
                validate::execute(args, self.settings.as_deref(), &output).await
            }
            Some(Commands::Version) => version::execute(&output).await,
            None => {
                Cli::command().print_help()?;
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn,ignore=warn,globset=warn"),
            1 => tracing_subscriber::EnvFilter::new("info,ignore=warn,globset=warn"),
            2 => tracing_subscriber::EnvFilter::new("debug,ignore=warn,globset=warn"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // stderr keeps `--json` output on stdout clean
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
