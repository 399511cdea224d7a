//! Diff-and-sync engine: computes the structural difference between two
//! loaded stores and applies it so the target converges to the source.
//!
//! The pipeline is three stages with a strict data boundary between them:
//! [`diff`] produces an immutable [`Delta`], [`SyncExecutor`] consumes a
//! Delta and produces a [`SyncReport`], and [`Summary`] renders either for
//! humans or machines. Reads are synchronous over loaded indexes; only the
//! apply path does I/O.

pub mod delta;
pub mod diff;
pub mod error;
pub mod executor;
pub mod report;

pub use delta::{AttrChange, CreateEntry, Delta, OpCounts, TypeDelta};
pub use diff::diff;
pub use error::{Error, Result};
pub use executor::{Outcome, SyncExecutor, SyncOptions, SyncReport, TypeReport};
pub use report::{EntrySummary, Op, Summary, TypeSummary};
