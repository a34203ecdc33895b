//! # git2site CLI
//!
//! This is the binary entry point for the `git2site` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Setting up logging and colored output.
//! - Executing the appropriate command based on the parsed arguments.
//!
//! The pipeline itself lives in the `git2site` library crate; the binary is a
//! thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
