//! petdash - background refresh and caching for pet device dashboards
//!
//! Main entry point for the petdash CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod app;
mod commands;

use commands::{config, refresh, run};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// petdash - keeps pet device dashboards fresh from slow vendor clouds
#[derive(Parser)]
#[command(name = "petdash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding config.toml (default: ~/.config/petdash)
    #[arg(long, global = true, env = "PETDASH_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Directory searched for a project-local petdash.toml (default: cwd)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the refresh scheduler until interrupted
    Run(run::RunArgs),

    /// Refresh every source once and report the outcome
    Refresh(refresh::RefreshArgs),

    /// Show the resolved configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing: console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "petdash=debug,petdash_refresh=debug,petdash_session=debug,petdash_scheduler=debug,petdash_cache=debug,info"
    } else {
        "petdash=info,petdash_refresh=info,petdash_session=info,petdash_scheduler=info,warn"
    };

    let log_dir = cli
        .config_dir
        .clone()
        .or_else(petdash_config::user_config_dir)
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "petdash.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "petdash=trace,petdash_refresh=trace,petdash_session=trace,petdash_scheduler=trace,petdash_cache=debug,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        config_dir: cli.config_dir,
        project_dir: cli.project_dir,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Refresh(args) => refresh::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
