//! JSON-file store backend ("local" side).
//!
//! The source is a snapshot file holding either a flat JSON array of record
//! objects (single record type) or an object keyed by type name, each key
//! mapping to an array. A record object may carry a `"parent"` key naming
//! the uid of its parent record; all other undeclared keys are ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use drift_model::{Record, RecordSchema};

use crate::adapter::StoreAdapter;
use crate::error::{Error, Result};
use crate::index::StoreIndex;

/// Reserved key in a raw record object naming the parent record's uid.
const PARENT_KEY: &str = "parent";

/// Store backend loading from a JSON snapshot file.
///
/// The backend is read-only: `add`/`update`/`remove` mutate the in-memory
/// index only, which is what the executor needs when this side is the
/// dry-run target. The file itself is never written.
pub struct JsonFileStore {
    name: String,
    path: PathBuf,
    schemas: Vec<RecordSchema>,
    index: RwLock<StoreIndex>,
}

impl JsonFileStore {
    /// Create a store reading from `path`. Nothing is loaded until `load`.
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>, schemas: &[RecordSchema]) -> Self {
        Self {
            name: name.into(),
            path: path.as_ref().to_path_buf(),
            schemas: schemas.to_vec(),
            index: RwLock::new(StoreIndex::new(schemas)),
        }
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn malformed(&self, message: impl Into<String>) -> Error {
        Error::MalformedSource {
            source_name: self.path.display().to_string(),
            message: message.into(),
        }
    }

    /// Find the parent type for a child type: the unique schema declaring
    /// `child_type` among its children.
    fn parent_type_of(&self, child_type: &str) -> Option<&RecordSchema> {
        self.schemas
            .iter()
            .find(|schema| schema.children.iter().any(|c| c == child_type))
    }

    fn index_records(
        &self,
        index: &mut StoreIndex,
        schema: &RecordSchema,
        items: &[Value],
    ) -> Result<()> {
        for item in items {
            let Value::Object(map) = item else {
                return Err(self.malformed(format!(
                    "expected an object in the '{}' array, got {item}",
                    schema.name
                )));
            };

            let raw: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let parent_uid = raw.get(PARENT_KEY).and_then(Value::as_str).map(String::from);

            let mut record = Record::from_fields(schema, raw).map_err(|e| {
                self.malformed(e.to_string())
            })?;

            if let Some(uid) = parent_uid {
                let parent_schema = self.parent_type_of(&schema.name).ok_or_else(|| {
                    self.malformed(format!(
                        "record type '{}' carries a parent reference but no schema declares it as a child",
                        schema.name
                    ))
                })?;
                record = record.with_parent(parent_schema.name.clone(), uid);
            }

            index.insert(record)?;
        }
        Ok(())
    }

    fn build_index(&self, root: Value) -> Result<StoreIndex> {
        let mut index = StoreIndex::new(&self.schemas);

        match root {
            Value::Array(items) => {
                // Flat-array form: all records belong to the sole schema.
                if self.schemas.len() != 1 {
                    return Err(self.malformed(
                        "flat-array snapshots require exactly one declared record type",
                    ));
                }
                self.index_records(&mut index, &self.schemas[0], &items)?;
            }
            Value::Object(by_type) => {
                for (type_name, items) in by_type {
                    let Some(schema) = self.schemas.iter().find(|s| s.name == type_name) else {
                        return Err(self.malformed(format!("unknown record type '{type_name}'")));
                    };
                    let Value::Array(items) = items else {
                        return Err(
                            self.malformed(format!("expected an array under '{type_name}'"))
                        );
                    };
                    self.index_records(&mut index, schema, &items)?;
                }
            }
            other => {
                return Err(self.malformed(format!(
                    "expected a JSON array or object at the top level, got {other}"
                )));
            }
        }

        Ok(index)
    }
}

#[async_trait]
impl StoreAdapter for JsonFileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn schemas(&self) -> Vec<RecordSchema> {
        self.index.read().schemas()
    }

    fn schema(&self, type_name: &str) -> Option<RecordSchema> {
        self.index.read().schema(type_name).cloned()
    }

    async fn load(&self) -> Result<()> {
        let content = std::fs::read_to_string(&self.path)?;
        let root: Value = serde_json::from_str(&content)
            .map_err(|e| self.malformed(format!("invalid JSON: {e}")))?;

        // Build the replacement index fully before swapping it in, so a
        // malformed source leaves the prior index untouched.
        let fresh = self.build_index(root)?;
        let total: usize = self.schemas.iter().map(|s| fresh.len(&s.name)).sum();
        debug!(store = %self.name, records = total, "loaded snapshot");

        *self.index.write() = fresh;
        Ok(())
    }

    fn get(&self, type_name: &str, uid: &str) -> Result<Record> {
        self.index.read().get(type_name, uid)
    }

    fn get_all(&self, type_name: &str) -> Vec<Record> {
        self.index.read().get_all(type_name)
    }

    fn uids(&self, type_name: &str) -> Vec<String> {
        self.index.read().uids(type_name)
    }

    fn get_by_uids(&self, type_name: &str, uids: &[String]) -> Result<Vec<Record>> {
        self.index.read().get_by_uids(type_name, uids)
    }

    fn children_of(&self, parent_type: &str, parent_uid: &str, child_type: &str) -> Vec<String> {
        self.index.read().children_of(parent_type, parent_uid, child_type)
    }

    async fn add(&self, record: Record) -> Result<()> {
        self.index.write().insert(record)?;
        Ok(())
    }

    async fn update(
        &self,
        type_name: &str,
        uid: &str,
        patch: &BTreeMap<String, Value>,
    ) -> Result<()> {
        self.index.write().apply_patch(type_name, uid, patch)?;
        Ok(())
    }

    async fn remove(&self, type_name: &str, uid: &str, cascade: bool) -> Result<()> {
        self.index.write().remove(type_name, uid, cascade)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn employee_schema() -> RecordSchema {
        RecordSchema::new(
            "employee",
            vec!["username".into()],
            vec!["company".into(), "job".into()],
        )
    }

    fn write_snapshot(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("snapshot.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_flat_array() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(
            &dir,
            r#"[
                {"username": "alice0", "company": "NewCo", "job": "Engineer"},
                {"username": "bob1", "company": "OldCo", "job": "Manager"}
            ]"#,
        );

        let store = JsonFileStore::new("local", &path, &[employee_schema()]);
        store.load().await.unwrap();

        assert_eq!(store.uids("employee"), vec!["alice0", "bob1"]);
    }

    #[tokio::test]
    async fn test_load_ignores_extra_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(
            &dir,
            r#"[{"username": "alice0", "company": "NewCo", "job": "Engineer", "ssn": "123"}]"#,
        );

        let store = JsonFileStore::new("local", &path, &[employee_schema()]);
        store.load().await.unwrap();

        let record = store.get("employee", "alice0").unwrap();
        assert!(!record.fields.contains_key("ssn"));
    }

    #[tokio::test]
    async fn test_load_missing_identifier_keeps_prior_index() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(
            &dir,
            r#"[{"username": "alice0", "company": "NewCo", "job": "Engineer"}]"#,
        );

        let store = JsonFileStore::new("local", &path, &[employee_schema()]);
        store.load().await.unwrap();

        // Rewrite the file with a record missing its identifier field.
        fs::write(&path, r#"[{"company": "NewCo", "job": "Engineer"}]"#).unwrap();
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, Error::MalformedSource { .. }));

        // Prior index untouched.
        assert_eq!(store.uids("employee"), vec!["alice0"]);
    }

    #[tokio::test]
    async fn test_load_typed_object_with_children() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(
            &dir,
            r#"{
                "employee": [{"username": "alice0", "company": "NewCo", "job": "Engineer"}],
                "badge": [{"serial": "b-1", "active": true, "parent": "alice0"}]
            }"#,
        );

        let schemas = vec![
            employee_schema().with_children(vec!["badge".into()]),
            RecordSchema::new("badge", vec!["serial".into()], vec!["active".into()]),
        ];
        let store = JsonFileStore::new("local", &path, &schemas);
        store.load().await.unwrap();

        let badge = store.get("badge", "b-1").unwrap();
        let parent = badge.parent.unwrap();
        assert_eq!(parent.type_name, "employee");
        assert_eq!(parent.uid, "alice0");
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_type() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(&dir, r#"{"device": []}"#);

        let store = JsonFileStore::new("local", &path, &[employee_schema()]);
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, Error::MalformedSource { .. }));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(
            "local",
            dir.path().join("missing.json"),
            &[employee_schema()],
        );
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_reload_replaces_wholesale() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(
            &dir,
            r#"[{"username": "alice0", "company": "NewCo", "job": "Engineer"}]"#,
        );

        let store = JsonFileStore::new("local", &path, &[employee_schema()]);
        store.load().await.unwrap();

        fs::write(
            &path,
            r#"[{"username": "carol2", "company": "NewCo", "job": "Clerk"}]"#,
        )
        .unwrap();
        store.load().await.unwrap();

        assert_eq!(store.uids("employee"), vec!["carol2"]);
    }
}
