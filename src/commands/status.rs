//! # Status Command Implementation
//!
//! Lists every configured repository with the time of its current commit
//! and of the last processed one. Repositories whose commit is newer than
//! their checkpoint are marked stale; `generate --incremental` would pick
//! them up.
//!
//! This command is read-only.

use anyhow::Result;
use clap::Args;
use console::style;
use std::path::PathBuf;

use git2site::config::SiteConfig;
use git2site::phases::orchestrator::{self, RepositoryStatus};

/// Show the state of the configured repositories
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Path to the site file (defaults to site.yaml in the current directory)
    #[arg(short, long, value_name = "PATH", env = "GIT2SITE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `status` command.
pub fn execute(args: StatusArgs) -> Result<()> {
    let config_path = orchestrator::config_path(args.config.as_deref(), &std::env::current_dir()?);
    let config = SiteConfig::from_file(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load config from {}: {}",
            config_path.display(),
            e
        )
    })?;

    let repositories = orchestrator::open_repositories(&config);
    let rows = orchestrator::status(&repositories);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        display_status(&config, &rows);
    }
    Ok(())
}

fn display_status(config: &SiteConfig, rows: &[RepositoryStatus]) {
    println!("Site: {}", style(&config.site_id).bold());
    if rows.is_empty() {
        println!("   No repositories found");
        return;
    }

    for row in rows {
        let marker = if row.stale {
            style("stale").yellow()
        } else {
            style("current").green()
        };
        println!(
            "   [{}] {:<8} {:<20} commit {}  processed {}",
            marker,
            row.kind,
            row.id,
            row.commit.as_deref().unwrap_or("-"),
            row.processed.as_deref().unwrap_or("-"),
        );
    }

    let stale = rows.iter().filter(|row| row.stale).count();
    if stale > 0 {
        println!();
        println!("{} of {} repositories changed since the last run", stale, rows.len());
    }
}
