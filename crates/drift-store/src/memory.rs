//! In-memory store backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use drift_model::{Record, RecordSchema};

use crate::adapter::StoreAdapter;
use crate::error::Result;
use crate::index::StoreIndex;

/// Store backend with no external source: the index is the store.
///
/// Used as the diff target in tests and as the apply target for dry runs.
pub struct MemoryStore {
    name: String,
    index: RwLock<StoreIndex>,
}

impl MemoryStore {
    /// Create an empty store for the given schemas.
    pub fn new(name: impl Into<String>, schemas: &[RecordSchema]) -> Self {
        Self {
            name: name.into(),
            index: RwLock::new(StoreIndex::new(schemas)),
        }
    }

    /// Number of indexed records of a type.
    pub fn len(&self, type_name: &str) -> usize {
        self.index.read().len(type_name)
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn schemas(&self) -> Vec<RecordSchema> {
        self.index.read().schemas()
    }

    fn schema(&self, type_name: &str) -> Option<RecordSchema> {
        self.index.read().schema(type_name).cloned()
    }

    /// No external source to load from; the index persists as-is.
    async fn load(&self) -> Result<()> {
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
    use crate::error::Error;
    use serde_json::json;

    fn employee_schema() -> RecordSchema {
        RecordSchema::new(
            "employee",
            vec!["username".into()],
            vec!["company".into(), "job".into()],
        )
    }

    fn employee(username: &str) -> Record {
        Record::from_fields(
            &employee_schema(),
            BTreeMap::from([
                ("username".to_string(), json!(username)),
                ("company".to_string(), json!("NewCo")),
                ("job".to_string(), json!("Engineer")),
            ]),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_get_remove_roundtrip() {
        let store = MemoryStore::new("memory", &[employee_schema()]);
        store.add(employee("alice0")).await.unwrap();

        assert_eq!(store.len("employee"), 1);
        assert_eq!(store.get("employee", "alice0").unwrap().uid(&employee_schema()), "alice0");

        store.remove("employee", "alice0", false).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_add_duplicate_fails() {
        let store = MemoryStore::new("memory", &[employee_schema()]);
        store.add(employee("alice0")).await.unwrap();
        let err = store.add(employee("alice0")).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_remove_missing_fails() {
        let store = MemoryStore::new("memory", &[employee_schema()]);
        let err = store.remove("employee", "ghost", false).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_patches_attributes() {
        let store = MemoryStore::new("memory", &[employee_schema()]);
        store.add(employee("bob1")).await.unwrap();

        let patch = BTreeMap::from([("company".to_string(), json!("OtherCo"))]);
        store.update("employee", "bob1", &patch).await.unwrap();
        assert_eq!(
            store.get("employee", "bob1").unwrap().fields["company"],
            json!("OtherCo")
        );
    }

    #[tokio::test]
    async fn test_load_is_noop() {
        let store = MemoryStore::new("memory", &[employee_schema()]);
        store.add(employee("alice0")).await.unwrap();
        store.load().await.unwrap();
        assert_eq!(store.len("employee"), 1);
    }
}
