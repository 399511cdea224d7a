//! Sync command implementation

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tokio::sync::watch;

use drift_engine::{Summary, SyncExecutor, SyncOptions, diff};

use crate::cli::StoreArgs;
use crate::error::Result;

/// Compute the difference and apply it to the remote side.
///
/// Entry-level failures are reported in the summary but do not fail the
/// process; only load failures and schema mismatches exit non-zero.
pub async fn run_sync(
    stores: &StoreArgs,
    json: bool,
    dry_run: bool,
    concurrency: usize,
    timeout: u64,
) -> Result<()> {
    let (local, remote) = super::open_stores(stores).await?;
    let types = super::top_level_types(&local.schemas());

    let delta = diff(local.as_ref(), remote.as_ref(), &types)?;

    if dry_run {
        let summary = Summary::of_delta(&delta);
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }
        println!(
            "{} Dry run: showing what would be applied to '{}'",
            "=>".blue().bold(),
            remote.name()
        );
        if summary.is_empty() {
            println!("{} Stores are in sync. Nothing to apply.", "OK".green().bold());
        } else {
            print!("{summary}");
        }
        return Ok(());
    }

    if delta.is_empty() {
        if json {
            println!("{}", serde_json::to_string_pretty(&Summary::of_delta(&delta))?);
        } else {
            println!("{} Stores are in sync. Nothing to apply.", "OK".green().bold());
        }
        return Ok(());
    }

    // Ctrl-C flips the cancellation signal; in-flight operations finish,
    // unattempted ones are reported as skipped.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let options = SyncOptions {
        max_concurrency: concurrency,
        op_timeout: Duration::from_secs(timeout),
        cancel: Some(cancel_rx),
    };
    let executor = SyncExecutor::new(Arc::clone(&remote), options);
    let report = executor.apply(&delta).await;
    let summary = Summary::of_report(&delta, &report);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "{} Applying changes to '{}'...",
        "=>".blue().bold(),
        remote.name()
    );
    print!("{summary}");
    if report.is_clean() {
        println!("{} Remote now matches the local snapshot.", "OK".green().bold());
    } else {
        println!(
            "{} Some entries were not applied. Re-run to retry.",
            "WARN".yellow().bold()
        );
    }
    Ok(())
}
