//! McStats CLI
//!
//! Command-line daemon and tools for the McStats statistics mirror.
//!
//! # Commands
//!
//! - `run` - Run the periodic sync daemon until interrupted
//! - `sync-once` - Run a single sync; the exit code reflects the outcome

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// McStats statistics mirror tools.
#[derive(Parser)]
#[command(name = "mcstats")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(global = true, short, long, default_value = "mcstats.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the periodic sync daemon until interrupted
    Run,

    /// Run a single sync and exit
    SyncOnce,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run => {
            commands::run::run(&cli.config).await?;
        }
        Commands::SyncOnce => {
            if !commands::sync_once::run(&cli.config).await? {
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("McStats CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
