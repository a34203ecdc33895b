//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;

use crate::commands;

/// git2site - Publish per-author git repositories as one static site
#[derive(Parser, Debug)]
#[command(name = "git2site")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the site from the configured repositories
    Generate(commands::generate::GenerateArgs),

    /// Show the commit and checkpoint of every configured repository
    Status(commands::status::StatusArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        // RUST_LOG wins over --log-level
        env_logger::Builder::from_env(Env::default().default_filter_or(&self.log_level))
            .format_timestamp_secs()
            .init();

        match self.color.as_str() {
            "always" => console::set_colors_enabled(true),
            "never" => console::set_colors_enabled(false),
            "auto" => {}
            other => anyhow::bail!(
                "Invalid --color value '{}' (expected always, never or auto)",
                other
            ),
        }

        match self.command {
            Commands::Generate(args) => commands::generate::execute(args),
            Commands::Status(args) => commands::status::execute(args),
        }
    }
}
