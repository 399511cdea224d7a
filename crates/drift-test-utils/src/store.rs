//! Seeded adapters and on-disk JSON snapshot helpers.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tempfile::TempDir;

use drift_model::{Record, RecordSchema};
use drift_store::{MemoryStore, StoreAdapter};

/// Build a memory store pre-populated with `records`.
pub async fn seeded_memory(
    name: &str,
    schemas: &[RecordSchema],
    records: Vec<Record>,
) -> MemoryStore {
    let store = MemoryStore::new(name, schemas);
    for record in records {
        store
            .add(record)
            .await
            .expect("seeded_memory: duplicate record in fixture");
    }
    store
}

/// A JSON snapshot file in a temporary directory, suitable for a
/// file-backed store. The directory lives as long as this value.
pub struct SnapshotFile {
    _dir: TempDir,
    path: PathBuf,
}

impl SnapshotFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(content: &Value) -> Self {
        let dir = TempDir::new().expect("SnapshotFile: failed to create temp dir");
        let path = dir.path().join("snapshot.json");
        fs::write(&path, serde_json::to_string_pretty(content).unwrap())
            .expect("SnapshotFile: failed to write snapshot");
        Self { _dir: dir, path }
    }
}

/// Write records of a single type as a flat JSON array snapshot.
pub fn snapshot_array(records: &[Record]) -> SnapshotFile {
    let items: Vec<Value> = records.iter().map(raw_object).collect();
    SnapshotFile::write(&json!(items))
}

/// Write a multi-type snapshot keyed by record type.
pub fn snapshot_by_type(groups: &[(&str, Vec<Record>)]) -> SnapshotFile {
    let mut root = Map::new();
    for (type_name, records) in groups {
        let items: Vec<Value> = records.iter().map(raw_object).collect();
        root.insert(type_name.to_string(), json!(items));
    }
    SnapshotFile::write(&Value::Object(root))
}

/// Flatten a record into the raw snapshot object form, encoding a parent
/// reference as the reserved `"parent"` key.
fn raw_object(record: &Record) -> Value {
    let mut map: Map<String, Value> = record
        .fields
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if let Some(parent) = &record.parent {
        map.insert("parent".to_string(), json!(parent.uid));
    }
    Value::Object(map)
}
