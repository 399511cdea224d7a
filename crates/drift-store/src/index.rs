//! In-memory record index shared by all adapter backends.
//!
//! The index maps `(record type, identifier key)` to a record instance and
//! is rebuilt wholesale on each `load`. Backends hold it behind a lock and
//! delegate their read path and the in-memory half of their write path here.

use std::collections::BTreeMap;

use serde_json::Value;

use drift_model::{Record, RecordSchema};

use crate::error::{Error, Result};

/// Index of loaded records, keyed by type then uid.
///
/// `BTreeMap` keying gives the lexicographic iteration order the diff
/// engine relies on for deterministic output.
#[derive(Debug, Clone, Default)]
pub struct StoreIndex {
    schemas: BTreeMap<String, RecordSchema>,
    records: BTreeMap<String, BTreeMap<String, Record>>,
}

impl StoreIndex {
    /// Create an empty index for the given schemas.
    pub fn new(schemas: &[RecordSchema]) -> Self {
        let mut index = Self::default();
        for schema in schemas {
            index.schemas.insert(schema.name.clone(), schema.clone());
            index.records.insert(schema.name.clone(), BTreeMap::new());
        }
        index
    }

    /// Schema for a record type, if declared.
    pub fn schema(&self, type_name: &str) -> Option<&RecordSchema> {
        self.schemas.get(type_name)
    }

    /// All declared schemas, sorted by type name.
    pub fn schemas(&self) -> Vec<RecordSchema> {
        self.schemas.values().cloned().collect()
    }

    fn require_schema(&self, type_name: &str) -> Result<&RecordSchema> {
        self.schemas.get(type_name).ok_or(Error::UnknownType {
            type_name: type_name.to_string(),
        })
    }

    /// Number of indexed records of a type.
    pub fn len(&self, type_name: &str) -> usize {
        self.records.get(type_name).map_or(0, BTreeMap::len)
    }

    /// Whether no records of any type are indexed.
    pub fn is_empty(&self) -> bool {
        self.records.values().all(BTreeMap::is_empty)
    }

    /// Insert a record, failing if its uid is already indexed.
    pub fn insert(&mut self, record: Record) -> Result<String> {
        let schema = self.require_schema(&record.type_name)?.clone();
        let uid = record.uid(&schema);
        let by_uid = self.records.entry(schema.name.clone()).or_default();
        if by_uid.contains_key(&uid) {
            return Err(Error::AlreadyExists {
                type_name: schema.name,
                uid,
            });
        }
        by_uid.insert(uid.clone(), record);
        Ok(uid)
    }

    /// Exact lookup by identifier key.
    pub fn get(&self, type_name: &str, uid: &str) -> Result<Record> {
        self.require_schema(type_name)?;
        self.records
            .get(type_name)
            .and_then(|by_uid| by_uid.get(uid))
            .cloned()
            .ok_or_else(|| Error::not_found(type_name, uid))
    }

    /// All records of a type, uid-sorted.
    pub fn get_all(&self, type_name: &str) -> Vec<Record> {
        self.records
            .get(type_name)
            .map(|by_uid| by_uid.values().cloned().collect())
            .unwrap_or_default()
    }

    /// All uids of a type, sorted.
    pub fn uids(&self, type_name: &str) -> Vec<String> {
        self.records
            .get(type_name)
            .map(|by_uid| by_uid.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Batched lookup. Collects every missing uid and reports them together
    /// in one `NotFound` rather than aborting on the first miss.
    pub fn get_by_uids(&self, type_name: &str, uids: &[String]) -> Result<Vec<Record>> {
        self.require_schema(type_name)?;
        let by_uid = self.records.get(type_name);

        let mut found = Vec::with_capacity(uids.len());
        let mut missing = Vec::new();
        for uid in uids {
            match by_uid.and_then(|m| m.get(uid)) {
                Some(record) => found.push(record.clone()),
                None => missing.push(uid.clone()),
            }
        }

        if missing.is_empty() {
            Ok(found)
        } else {
            Err(Error::NotFound {
                type_name: type_name.to_string(),
                uids: missing,
            })
        }
    }

    /// Apply an attribute patch to an indexed record, returning the updated
    /// record so live backends can mirror the write externally.
    pub fn apply_patch(
        &mut self,
        type_name: &str,
        uid: &str,
        patch: &BTreeMap<String, Value>,
    ) -> Result<Record> {
        let schema = self.require_schema(type_name)?.clone();
        let by_uid = self
            .records
            .get_mut(type_name)
            .ok_or_else(|| Error::not_found(type_name, uid))?;
        let record = by_uid
            .get(uid)
            .ok_or_else(|| Error::not_found(type_name, uid))?;
        let updated = record.patched(&schema, patch)?;
        by_uid.insert(uid.to_string(), updated.clone());
        Ok(updated)
    }

    /// Uids of records of `child_type` whose parent is `(parent_type, parent_uid)`,
    /// sorted.
    pub fn children_of(&self, parent_type: &str, parent_uid: &str, child_type: &str) -> Vec<String> {
        self.records
            .get(child_type)
            .map(|by_uid| {
                by_uid
                    .iter()
                    .filter(|(_, record)| {
                        record.parent.as_ref().is_some_and(|p| {
                            p.type_name == parent_type && p.uid == parent_uid
                        })
                    })
                    .map(|(uid, _)| uid.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove a record. With `cascade`, declared children are removed first,
    /// depth-first. Returns `(uid, record)` pairs in removal order so live
    /// backends can mirror each external delete.
    pub fn remove(
        &mut self,
        type_name: &str,
        uid: &str,
        cascade: bool,
    ) -> Result<Vec<(String, Record)>> {
        let schema = self.require_schema(type_name)?.clone();
        if !self
            .records
            .get(type_name)
            .is_some_and(|by_uid| by_uid.contains_key(uid))
        {
            return Err(Error::not_found(type_name, uid));
        }

        let mut removed = Vec::new();
        if cascade {
            for child_type in &schema.children {
                for child_uid in self.children_of(type_name, uid, child_type) {
                    removed.extend(self.remove(child_type, &child_uid, cascade)?);
                }
            }
        }

        let record = self
            .records
            .get_mut(type_name)
            .and_then(|by_uid| by_uid.remove(uid))
            .ok_or_else(|| Error::not_found(type_name, uid))?;
        removed.push((uid.to_string(), record));
        Ok(removed)
    }
}
