//! heraldd - Herald notification daemon
//!
//! Runs the alert delivery engine and its periodic reminder sweep.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use herald_server::{LogConfig, LogFormat, ServerConfig, build_herald, run_until};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_CONFIG_PATH: &str = "/etc/herald/config.json";

#[derive(Parser)]
#[command(name = "heraldd")]
#[command(about = "Herald alert notification daemon")]
#[command(version)]
struct Cli {
    /// Log output format (overrides the config file)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the notification engine
    Run {
        /// Path to config file
        #[arg(short, long, env = "HERALD_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a config file and exit
    CheckConfig {
        /// Path to config file
        #[arg(short, long, env = "HERALD_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = ServerConfig::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            init_tracing(&config.log, cli.log_format)?;
            run(config).await?;
        }

        Commands::InitConfig { output, force } => {
            init_tracing(&LogConfig::default(), cli.log_format)?;
            init_config(&output, force)?;
        }

        Commands::CheckConfig { config: path } => {
            init_tracing(&LogConfig::default(), cli.log_format)?;
            match ServerConfig::load(&path) {
                Ok(config) => info!(
                    config = %path.display(),
                    reminder_interval_minutes = config.engine.reminder_interval_minutes,
                    "config is valid"
                ),
                Err(e) => {
                    error!(config = %path.display(), error = %e, "config is invalid");
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(log: &LogConfig, format_override: Option<LogFormat>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .with_context(|| format!("invalid log level '{}'", log.level))?;

    match format_override.unwrap_or(log.format) {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }
    Ok(())
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    info!(
        reminder_interval_minutes = config.engine.reminder_interval_minutes,
        sweep_budget_secs = config.engine.sweep_budget_secs,
        "starting heraldd"
    );

    let herald = build_herald(&config);
    run_until(&herald, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
    })
    .await
    .context("reminder task failed to start")?;
    Ok(())
}

fn init_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite",
            output.display()
        );
    }

    ServerConfig::default().save(output)?;
    info!(path = %output.display(), "wrote sample config");
    Ok(())
}
