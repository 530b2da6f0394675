//! Config command - configuration inspection and setup.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use serde::Serialize;

use petdash_config::{PetdashConfig, secrets};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration (passwords redacted)
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./petdash.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Init { local } => cmd_init(ctx, local),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    loaded_from: Vec<String>,
    warnings: &'a [String],
    config: PetdashConfig,
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = loaded.config.redacted();

    if ctx.json_output {
        let output = ShowOutput {
            loaded_from: loaded
                .loaded_from()
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            warnings: &loaded.warnings,
            config,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}\n", style("petdash configuration").bold());

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("{}\n", dim.apply_to("No config files loaded (using defaults)"));
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    if config.sources.is_empty() {
        println!("{}\n", dim.apply_to("No sources configured"));
    } else {
        println!("Sources:");
        for (name, source) in &config.sources {
            let state = if source.enabled {
                Style::new().green().apply_to("enabled")
            } else {
                Style::new().yellow().apply_to("disabled")
            };
            println!(
                "  {:<12} {:<10} {}  {}",
                style(name).cyan(),
                source.kind,
                source.base_url,
                state
            );
            if ctx.verbose {
                let origin = secrets::resolve_password(name, &loaded.config.sources[name])
                    .map(|secret| secret.source.to_string())
                    .unwrap_or_else(|_| "missing".to_string());
                println!("  {:<12} password: {}", "", dim.apply_to(origin));
            }
        }
        println!();
    }

    println!("---\n{}", config.to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    println!("Config file search order (later overrides earlier):\n");
    for source in &loaded.sources {
        let status = if source.loaded {
            Style::new().green().apply_to("✓ loaded")
        } else {
            Style::new().dim().apply_to("· not found")
        };
        println!("  {} {}", status, source.path.display());
    }
    println!();

    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'petdash config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

fn user_config_file(ctx: &Context) -> Result<PathBuf> {
    let dir = ctx
        .config_dir
        .clone()
        .or_else(petdash_config::user_config_dir)
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(dir.join("config.toml"))
}

fn cmd_init(ctx: &Context, local: bool) -> Result<()> {
    let path = if local {
        ctx.project_dir
            .clone()
            .unwrap_or_default()
            .join("petdash.toml")
    } else {
        user_config_file(ctx)?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    let config = PetdashConfig {
        cache: Some(Default::default()),
        refresh: Some(Default::default()),
        session: Some(Default::default()),
        ..Default::default()
    };
    petdash_config::save_config(&config, &path)?;

    println!("{} Created {}", style("✓").green(), path.display());
    println!("Add a [sources.<name>] table for each device cloud.");
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    println!("{}", user_config_file(ctx)?.display());
    Ok(())
}
