//! Generate command implementation
//!
//! Loads the site file, opens the configured working copies and runs the
//! pipeline once. With `--incremental` nothing is written unless a
//! repository has a commit newer than its checkpoint, which makes the
//! command cheap to run from a scheduler.

use anyhow::Result;
use clap::Args;
use console::style;
use std::path::PathBuf;
use std::time::Instant;

use git2site::config::SiteConfig;
use git2site::phases::orchestrator::{self, GenerationReport, RunOutcome};
use git2site::render::TemplateRenderer;

/// Arguments for the generate command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Path to the site file (defaults to site.yaml in the current directory)
    #[arg(short, long, value_name = "PATH", env = "GIT2SITE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only generate when a repository changed since the last run
    #[arg(short, long)]
    pub incremental: bool,

    /// Suppress the summary
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the generate command
pub fn execute(args: GenerateArgs) -> Result<()> {
    let start_time = Instant::now();

    let config_path = orchestrator::config_path(args.config.as_deref(), &std::env::current_dir()?);
    if !config_path.exists() {
        anyhow::bail!("Configuration file not found: {}", config_path.display());
    }
    let config = SiteConfig::from_file(&config_path)?;

    let repositories = orchestrator::open_repositories(&config);
    let make_renderer = || {
        TemplateRenderer::new(
            &repositories.templates,
            config.content.template_default.as_deref(),
        )
    };

    let outcome = orchestrator::run(&config, &repositories, make_renderer, args.incremental);

    match outcome {
        Ok(RunOutcome::UpToDate) => {
            if !args.quiet {
                println!("{} Content is up to date", style("✓").green());
            }
            Ok(())
        }
        Ok(RunOutcome::Generated(report)) => {
            if !args.quiet {
                print_report(&config, &report, start_time.elapsed().as_secs_f64());
            }
            Ok(())
        }
        Err(e) => {
            if !args.quiet {
                println!("{} Generation of '{}' failed", style("✗").red(), config.site_id);
            }
            Err(e.into())
        }
    }
}

fn print_report(config: &SiteConfig, report: &GenerationReport, seconds: f64) {
    println!(
        "{} Generated '{}' in {:.2}s",
        style("✓").green(),
        config.site_id,
        seconds
    );
    println!(
        "   {} authors, {} content variants",
        report.authors, report.variants
    );
    println!(
        "   {} pages rendered, {} files copied",
        report.rendered, report.copied
    );
    if !report.deleted.is_empty() {
        println!("   {} stale paths deleted", report.deleted.len());
    }
    if report.collisions > 0 {
        println!(
            "   {} {} output paths were written more than once",
            style("!").yellow(),
            report.collisions
        );
    }
    if report.delete_failures > 0 {
        println!(
            "   {} {} stale paths could not be deleted",
            style("!").yellow(),
            report.delete_failures
        );
    }
    println!("   Output: {}", style(config.webroot.display()).dim());
}
