//! Diff command implementation

use colored::Colorize;

use drift_engine::{Summary, diff};

use crate::cli::StoreArgs;
use crate::error::Result;

/// Load both sides, print the difference, mutate nothing.
pub async fn run_diff(stores: &StoreArgs, json: bool) -> Result<()> {
    let (local, remote) = super::open_stores(stores).await?;
    let types = super::top_level_types(&local.schemas());

    let delta = diff(local.as_ref(), remote.as_ref(), &types)?;
    let summary = Summary::of_delta(&delta);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "{} Comparing '{}' with '{}'...",
        "=>".blue().bold(),
        local.name(),
        remote.name()
    );
    if summary.is_empty() {
        println!("{} Stores are in sync.", "OK".green().bold());
    } else {
        print!("{summary}");
    }
    Ok(())
}
