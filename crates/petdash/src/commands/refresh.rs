//! Refresh command - one-shot refresh of every configured source.

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use petdash_refresh::{RefreshError, RefreshReport};

use super::Context;
use crate::app::Dashboard;

/// Arguments for the refresh command.
#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Refresh only this source
    #[arg(long)]
    pub source: Option<String>,
}

/// Run the refresh command.
///
/// Exits with an error when any source fails.
pub async fn run(args: RefreshArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let dashboard = Dashboard::build(&loaded.config).await?;

    let result = match args.source {
        Some(name) => refresh_one(&dashboard, &name, ctx).await,
        None => refresh_all(&dashboard, ctx).await,
    };

    dashboard.close().await;
    result
}

async fn refresh_one(dashboard: &Dashboard, name: &str, ctx: &Context) -> Result<()> {
    let entries = dashboard.orchestrator.refresh_source(name).await?;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::json!({ "source": name, "entries": entries })
        );
    } else {
        println!(
            "{} {} ({} entries)",
            style("✓").green(),
            style(name).cyan(),
            entries
        );
    }
    Ok(())
}

async fn refresh_all(dashboard: &Dashboard, ctx: &Context) -> Result<()> {
    let (report, failure) = match dashboard.orchestrator.force_refresh().await {
        Ok(report) => (report, None),
        Err(e) => {
            let Some(report) = e.report().cloned() else {
                return Err(e.into());
            };
            (report, Some(e))
        }
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    match failure {
        Some(RefreshError::AllFailed { .. }) => anyhow::bail!("every source failed to refresh"),
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn print_report(report: &RefreshReport) {
    let dim = Style::new().dim();
    let elapsed = report.finished_at - report.started_at;

    println!("{}", style("Refresh").bold());
    if report.sources.is_empty() {
        println!("  {}", dim.apply_to("No sources configured"));
    }
    for outcome in &report.sources {
        match &outcome.error {
            None => println!(
                "  {} {:<12} {} entries  {}",
                style("✓").green(),
                style(&outcome.source).cyan(),
                outcome.entries,
                dim.apply_to(format!("{}ms", outcome.elapsed_ms))
            ),
            Some(error) => println!(
                "  {} {:<12} {}",
                style("✗").red(),
                style(&outcome.source).cyan(),
                Style::new().red().apply_to(error)
            ),
        }
    }
    println!(
        "\n{} entries written in {}ms at {}",
        report.entries_written(),
        elapsed.num_milliseconds(),
        report
            .finished_at
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S")
    );
}
