//! Run command - keeps the dashboard cache fresh until Ctrl-C.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use tracing::info;

use petdash_scheduler::TaskScheduler;

use super::Context;
use crate::app::Dashboard;

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Print cache status every N seconds (0 disables)
    #[arg(long, default_value_t = 0)]
    pub status_every: u64,
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let dashboard = Dashboard::build(&loaded.config).await?;

    let scheduler = TaskScheduler::new();
    dashboard.orchestrator.register_jobs(&scheduler)?;
    scheduler.start();

    let names = dashboard.orchestrator.source_names();
    if !ctx.json_output {
        println!(
            "{} refreshing {} source(s): {}",
            style("petdash").bold(),
            names.len(),
            names.join(", ")
        );
        println!(
            "{}",
            Style::new()
                .dim()
                .apply_to(format!("jobs: {}", scheduler.task_names().join(", ")))
        );
    }

    wait_for_shutdown(&dashboard, args.status_every, ctx).await;

    info!("Shutting down");
    scheduler.stop().await;
    dashboard.close().await;

    print_job_stats(&scheduler, ctx)?;
    Ok(())
}

async fn wait_for_shutdown(dashboard: &Dashboard, status_every: u64, ctx: &Context) {
    if status_every == 0 {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
        return;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(status_every));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return,
            _ = ticker.tick() => {
                let status = dashboard.orchestrator.status().await;
                if ctx.json_output {
                    if let Ok(line) = serde_json::to_string(&status) {
                        println!("{}", line);
                    }
                } else {
                    let last = status
                        .last_refresh
                        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
                        .unwrap_or_else(|| "never".to_string());
                    println!(
                        "cache {}/{}  last refresh {}",
                        style(status.size).cyan(),
                        status.capacity,
                        style(last).cyan()
                    );
                }
            }
        }
    }
}

fn print_job_stats(scheduler: &TaskScheduler, ctx: &Context) -> Result<()> {
    let stats = scheduler.all_job_stats();

    if ctx.json_output {
        let jobs: serde_json::Map<String, serde_json::Value> = stats
            .into_iter()
            .map(|(name, stats)| {
                let value = serde_json::json!({
                    "runs": stats.runs,
                    "failures": stats.failures,
                    "last_run_at": stats.last_run_at,
                    "last_error": stats.last_error,
                });
                (name, value)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    let red = Style::new().red();
    println!("\n{}", style("Job summary").bold());
    for (name, stats) in stats {
        println!(
            "  {:<20} {} runs, {} failed",
            style(name).cyan(),
            stats.runs,
            stats.failures
        );
        if let Some(error) = stats.last_error {
            println!("  {:<20} {}", "", red.apply_to(error));
        }
    }
    Ok(())
}
