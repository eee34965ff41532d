//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod common;
pub mod config;
pub mod run;
pub mod status;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use sidekick::config::{Config, LoggingConfig};

#[derive(Parser)]
#[command(name = "sidekick")]
#[command(version)]
#[command(about = "Personal Telegram assistant", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.sidekick/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the assistant: Telegram polling plus the schedule sweep
    Run,
    /// Perform due scheduled tasks once and exit
    Sweep,
    /// Show stored history, memory and schedule
    Status,
    /// Validate configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Check the config file and the effective settings
    Check,
}

/// Parse arguments and dispatch to a command handler.
pub async fn run() -> Result<()> {
    // A missing .env is fine; variables already in the environment win.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let loaded = common::load_config(cli.config.as_deref());

    let logging_cfg = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    if let Err(e) = sidekick::utils::logging::init_logging(&logging_cfg) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            println!("sidekick {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Run) => run::cmd_run(loaded?).await?,
        Some(Commands::Sweep) => run::cmd_sweep(loaded?).await?,
        Some(Commands::Status) => status::cmd_status(&loaded?).await?,
        Some(Commands::Config { action }) => {
            let path = cli.config.clone().unwrap_or_else(Config::path);
            // The check reports unreadable files itself.
            let config = loaded.unwrap_or_default();
            config::cmd_config(action, &path, &config).await?;
        }
    }

    Ok(())
}
