//! Command implementations

mod diff;
mod sync;

pub use diff::run_diff;
pub use sync::run_sync;

use std::sync::Arc;

use drift_model::RecordSchema;
use drift_store::{JsonFileStore, RedisConfig, RedisStore, StoreAdapter};

use crate::cli::StoreArgs;
use crate::error::{CliError, Result};

/// The built-in employee schema, matching the demo snapshot layout:
/// `username` identifies a record, everything else is a synced attribute.
fn builtin_schemas() -> Vec<RecordSchema> {
    vec![RecordSchema::new(
        "employee",
        vec!["username".into()],
        vec![
            "name".into(),
            "company".into(),
            "job".into(),
            "ssn".into(),
            "residence".into(),
            "mail".into(),
        ],
    )]
}

/// Record types to diff at the top level: every schema not declared as
/// another schema's child.
fn top_level_types(schemas: &[RecordSchema]) -> Vec<String> {
    schemas
        .iter()
        .filter(|schema| {
            !schemas
                .iter()
                .any(|other| other.children.contains(&schema.name))
        })
        .map(|schema| schema.name.clone())
        .collect()
}

/// Open and load both sides of the comparison.
///
/// The local side reads the snapshot file. The remote side connects to
/// Redis when a URL is given; otherwise it re-reads the same snapshot
/// (demo mode, always in sync).
async fn open_stores(args: &StoreArgs) -> Result<(Arc<dyn StoreAdapter>, Arc<dyn StoreAdapter>)> {
    if !args.local.exists() {
        return Err(CliError::user(format!(
            "snapshot file '{}' does not exist",
            args.local.display()
        )));
    }

    let schemas = builtin_schemas();
    let local: Arc<dyn StoreAdapter> = Arc::new(JsonFileStore::new("local", &args.local, &schemas));

    let remote: Arc<dyn StoreAdapter> = match &args.remote {
        Some(url) => {
            let config = RedisConfig::new(url).with_prefix(args.prefix.clone());
            Arc::new(RedisStore::connect("remote", config, &schemas).await?)
        }
        None => Arc::new(JsonFileStore::new("remote", &args.local, &schemas)),
    };

    local.load().await?;
    remote.load().await?;
    Ok((local, remote))
}
