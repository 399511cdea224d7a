//! The store adapter capability interface.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use drift_model::{Record, RecordSchema};

use crate::error::Result;

/// Uniform access layer over one backing collection of records.
///
/// Reads are synchronous lookups against the in-memory index built by
/// `load`. The side-effecting operations are async because live backends
/// mirror them to the backing store over the network. All methods take
/// `&self`; backends guard their index with a lock so the sync executor can
/// apply sibling entries concurrently.
///
/// `load` must not run concurrently with any other call on the same adapter
/// instance; callers serialize the load → diff → sync phases.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Human-readable adapter name ("local", "redis", ...), used in reports
    /// and log lines.
    fn name(&self) -> &str;

    /// Schemas declared on this adapter, sorted by type name.
    fn schemas(&self) -> Vec<RecordSchema>;

    /// Schema for one record type, if declared.
    fn schema(&self, type_name: &str) -> Option<RecordSchema>;

    /// Rebuild the index wholesale from the backing source.
    ///
    /// # Errors
    ///
    /// Fails with `MalformedSource` if the source is missing declared
    /// identifier fields, or `Unavailable` if the backing store cannot be
    /// reached. On failure the prior index is left untouched.
    async fn load(&self) -> Result<()>;

    /// Exact lookup by identifier key.
    fn get(&self, type_name: &str, uid: &str) -> Result<Record>;

    /// Full listing of a type, uid-sorted.
    fn get_all(&self, type_name: &str) -> Vec<Record>;

    /// All identifier keys of a type, sorted.
    fn uids(&self, type_name: &str) -> Vec<String>;

    /// Batched lookup; fails with `NotFound` naming every missing uid.
    fn get_by_uids(&self, type_name: &str, uids: &[String]) -> Result<Vec<Record>>;

    /// Sorted uids of `child_type` records whose parent is
    /// `(parent_type, parent_uid)`.
    fn children_of(&self, parent_type: &str, parent_uid: &str, child_type: &str) -> Vec<String>;

    /// Index a new record and mirror it to the backing store.
    async fn add(&self, record: Record) -> Result<()>;

    /// Patch the attributes of an existing record and mirror the change.
    /// Identifier fields are never part of a patch.
    async fn update(&self, type_name: &str, uid: &str, patch: &BTreeMap<String, Value>)
    -> Result<()>;

    /// Remove a record and mirror the delete. With `cascade`, declared
    /// children are removed first.
    async fn remove(&self, type_name: &str, uid: &str, cascade: bool) -> Result<()>;
}
