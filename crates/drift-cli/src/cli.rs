//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// driftsync - diff and synchronise typed record collections
#[derive(Parser, Debug)]
#[command(name = "drift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where the two sides of the comparison live.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Path to the local JSON snapshot (the desired state)
    #[arg(long)]
    pub local: PathBuf,

    /// Redis URL of the remote store, e.g. redis://localhost:7379
    ///
    /// When omitted, the remote side also loads from the local snapshot,
    /// which always yields an empty diff. Useful for validating a snapshot.
    #[arg(long)]
    pub remote: Option<String>,

    /// Key prefix namespacing remote records (e.g. "drift:")
    #[arg(long, default_value = "")]
    pub prefix: String,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Preview the differences between local and remote, changing nothing
    Diff {
        #[command(flatten)]
        stores: StoreArgs,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Apply the differences so the remote converges to the local snapshot
    Sync {
        #[command(flatten)]
        stores: StoreArgs,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Show what would be applied without applying it
        #[arg(long)]
        dry_run: bool,

        /// Upper bound on in-flight operations per phase
        #[arg(long, default_value_t = 8)]
        concurrency: usize,

        /// Per-operation timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}
