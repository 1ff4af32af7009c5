//! Command-line interface for dirflow
//!
//! clap parses the arguments; each subcommand lives in its own module under
//! [`commands`].

pub mod commands;
mod output;

pub use commands::Cli;
pub use output::Output;
