//! driftsync CLI
//!
//! Compares a local JSON snapshot of typed records against a Redis-backed
//! remote store, and optionally applies the difference.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| error::CliError::user(format!("failed to set tracing subscriber: {e}")))?;
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Some(Commands::Diff { stores, json }) => commands::run_diff(&stores, json).await,
        Some(Commands::Sync {
            stores,
            json,
            dry_run,
            concurrency,
            timeout,
        }) => commands::run_sync(&stores, json, dry_run, concurrency, timeout).await,
        None => {
            // No command provided - show help hint
            println!("{} driftsync CLI", "drift".green().bold());
            println!();
            println!("Run {} for available commands.", "drift --help".cyan());
            Ok(())
        }
    }
}
