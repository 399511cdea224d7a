//! Redis store backend ("remote" side).
//!
//! Each record is one Redis hash keyed `{prefix}{type}:{uid}`, with hash
//! fields holding the record's field values as JSON text. `load` walks the
//! keyspace with a cursored `SCAN` (never `KEYS`) and `HGETALL`s each hash
//! into the in-memory index; `add`/`update`/`remove` mirror index changes to
//! the backing instance with `HSET`/`DEL`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde_json::Value;
use tracing::{debug, warn};

use drift_model::{Record, RecordSchema};

use crate::adapter::StoreAdapter;
use crate::error::{Error, Result};
use crate::index::StoreIndex;

/// Reserved hash field naming the parent record's uid.
const PARENT_FIELD: &str = "parent";

/// Keys fetched per SCAN round trip.
const SCAN_COUNT: usize = 512;

/// Connection settings for a [`RedisStore`].
///
/// Passed explicitly into the constructor so multiple stores (and tests)
/// can target different instances in one process.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://localhost:7379`
    pub url: String,
    /// Key prefix for namespacing when sharing an instance (e.g. `drift:`)
    pub prefix: String,
}

impl RedisConfig {
    /// Config for `url` with no key prefix.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prefix: String::new(),
        }
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// Store backend over a live Redis instance.
pub struct RedisStore {
    name: String,
    config: RedisConfig,
    connection: ConnectionManager,
    schemas: Vec<RecordSchema>,
    index: RwLock<StoreIndex>,
}

impl RedisStore {
    /// Connect to the configured instance. Fails with `Unavailable` if the
    /// instance cannot be reached.
    pub async fn connect(
        name: impl Into<String>,
        config: RedisConfig,
        schemas: &[RecordSchema],
    ) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        let connection = ConnectionManager::new(client).await?;
        debug!(url = %config.url, "connected to redis");

        Ok(Self {
            name: name.into(),
            config,
            connection,
            schemas: schemas.to_vec(),
            index: RwLock::new(StoreIndex::new(schemas)),
        })
    }

    fn key_for(&self, type_name: &str, uid: &str) -> String {
        build_key(&self.config.prefix, type_name, uid)
    }

    fn parse_key<'a>(&self, key: &'a str) -> Option<(&'a str, &'a str)> {
        split_key(&self.config.prefix, key)
    }

    fn parent_type_of(&self, child_type: &str) -> Option<&RecordSchema> {
        self.schemas
            .iter()
            .find(|schema| schema.children.iter().any(|c| c == child_type))
    }

    /// Hash field representation of a record value: always JSON text, so
    /// strings come back as strings even when their content would parse as
    /// a number or boolean. A raw-string encoding would make
    /// `"123456789"` indistinguishable from `123456789` on reload and the
    /// diff would report a phantom update on every run.
    fn encode_value(value: &Value) -> String {
        value.to_string()
    }

    /// Inverse of [`Self::encode_value`]: parse JSON text. Hash fields
    /// written by other clients as bare strings fall back to a plain
    /// string value.
    fn decode_value(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    }

    fn encode_fields(record: &Record) -> Vec<(String, String)> {
        let mut items: Vec<(String, String)> = record
            .fields
            .iter()
            .map(|(field, value)| (field.clone(), Self::encode_value(value)))
            .collect();
        if let Some(parent) = &record.parent {
            items.push((PARENT_FIELD.to_string(), parent.uid.clone()));
        }
        items
    }

    fn record_from_hash(
        &self,
        schema: &RecordSchema,
        hash: &BTreeMap<String, String>,
    ) -> Result<Record> {
        let raw: BTreeMap<String, Value> = hash
            .iter()
            .map(|(field, value)| (field.clone(), Self::decode_value(value)))
            .collect();

        let mut record = Record::from_fields(schema, raw).map_err(|e| Error::MalformedSource {
            source_name: self.config.url.clone(),
            message: e.to_string(),
        })?;

        if let Some(parent_uid) = hash.get(PARENT_FIELD) {
            if let Some(parent_schema) = self.parent_type_of(&schema.name) {
                record = record.with_parent(parent_schema.name.clone(), parent_uid.clone());
            }
        }
        Ok(record)
    }

    /// Walk the keyspace with a cursored SCAN, collecting keys under our
    /// prefix.
    async fn scan_keys(&self) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", self.config.prefix);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl StoreAdapter for RedisStore {
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
        let mut conn = self.connection.clone();
        let mut fresh = StoreIndex::new(&self.schemas);
        let mut loaded = 0usize;

        for key in self.scan_keys().await? {
            let Some((type_name, _uid)) = self.parse_key(&key) else {
                continue;
            };
            let Some(schema) = self.schemas.iter().find(|s| s.name == type_name) else {
                // Foreign keys under our prefix are not ours to interpret.
                warn!(%key, "skipping key of undeclared record type");
                continue;
            };

            let hash: BTreeMap<String, String> = conn.hgetall(&key).await?;
            let record = self.record_from_hash(schema, &hash)?;
            fresh.insert(record)?;
            loaded += 1;
        }

        debug!(store = %self.name, records = loaded, "loaded keyspace");
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
        // Reserve the uid in the index first so a duplicate fails before
        // any external write.
        let uid = self.index.write().insert(record.clone())?;
        let key = self.key_for(&record.type_name, &uid);
        let items = Self::encode_fields(&record);

        let mut conn = self.connection.clone();
        let result: std::result::Result<(), redis::RedisError> =
            conn.hset_multiple(&key, &items).await;
        if let Err(e) = result {
            // Roll the index back so it keeps mirroring the backing store.
            let _ = self.index.write().remove(&record.type_name, &uid, false);
            return Err(e.into());
        }
        debug!(%key, "created record");
        Ok(())
    }

    async fn update(
        &self,
        type_name: &str,
        uid: &str,
        patch: &BTreeMap<String, Value>,
    ) -> Result<()> {
        let previous = self.index.read().get(type_name, uid)?;
        self.index.write().apply_patch(type_name, uid, patch)?;

        let key = self.key_for(type_name, uid);
        let items: Vec<(String, String)> = patch
            .iter()
            .map(|(field, value)| (field.clone(), Self::encode_value(value)))
            .collect();

        let mut conn = self.connection.clone();
        let result: std::result::Result<(), redis::RedisError> =
            conn.hset_multiple(&key, &items).await;
        if let Err(e) = result {
            // Roll the patch back so the index keeps mirroring the
            // backing store.
            let mut index = self.index.write();
            let _ = index.remove(type_name, uid, false);
            let _ = index.insert(previous);
            return Err(e.into());
        }
        debug!(%key, fields = items.len(), "updated record");
        Ok(())
    }

    async fn remove(&self, type_name: &str, uid: &str, cascade: bool) -> Result<()> {
        let removed = self.index.write().remove(type_name, uid, cascade)?;

        let mut conn = self.connection.clone();
        for (position, (record_uid, record)) in removed.iter().enumerate() {
            let key = self.key_for(&record.type_name, record_uid);
            let result: std::result::Result<(), redis::RedisError> = conn.del(&key).await;
            if let Err(e) = result {
                // Keys from this position on still exist remotely;
                // restore their index entries before surfacing the error.
                let mut index = self.index.write();
                for (_, remaining) in &removed[position..] {
                    let _ = index.insert(remaining.clone());
                }
                return Err(e.into());
            }
            debug!(%key, "deleted record");
        }
        Ok(())
    }
}

/// Build the hash key for a record: `{prefix}{type}:{uid}`.
fn build_key(prefix: &str, type_name: &str, uid: &str) -> String {
    format!("{prefix}{type_name}:{uid}")
}

/// Split a raw key into `(type, uid)`, if it matches our layout.
fn split_key<'a>(prefix: &str, key: &'a str) -> Option<(&'a str, &'a str)> {
    key.strip_prefix(prefix)?.split_once(':')
}
