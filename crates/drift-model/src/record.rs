//! Record instances

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::schema::RecordSchema;

/// Separator used when joining identifier-field values into a uid.
pub const UID_SEPARATOR: &str = "__";

/// Back-reference from a child record to its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    /// Parent record type name
    pub type_name: String,
    /// Parent identifier key
    pub uid: String,
}

/// One typed record instance: a flat field map conforming to a schema.
///
/// Records are immutable values from the diff engine's point of view;
/// adapters replace them wholesale on reload and the sync executor produces
/// new field state through attribute patches rather than in-place mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record type name
    pub type_name: String,
    /// Field name to value mapping (identifiers and attributes)
    pub fields: BTreeMap<String, Value>,
    /// Parent reference for records of a declared child type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
}

impl Record {
    /// Build a record from a raw field map, keeping only fields the schema
    /// declares. Extra fields in `raw` are dropped; a missing identifier
    /// field is an error.
    pub fn from_fields(schema: &RecordSchema, raw: BTreeMap<String, Value>) -> Result<Self> {
        let mut fields = BTreeMap::new();

        for id in &schema.identifiers {
            match raw.get(id) {
                Some(value) => {
                    fields.insert(id.clone(), value.clone());
                }
                None => {
                    return Err(Error::MissingIdentifier {
                        type_name: schema.name.clone(),
                        field: id.clone(),
                    });
                }
            }
        }

        for attr in &schema.attributes {
            if let Some(value) = raw.get(attr) {
                fields.insert(attr.clone(), value.clone());
            }
        }

        Ok(Self {
            type_name: schema.name.clone(),
            fields,
            parent: None,
        })
    }

    /// Attach a parent reference.
    pub fn with_parent(mut self, type_name: impl Into<String>, uid: impl Into<String>) -> Self {
        self.parent = Some(ParentRef {
            type_name: type_name.into(),
            uid: uid.into(),
        });
        self
    }

    /// Unique identifier key: identifier-field values joined by `"__"`,
    /// in schema declaration order.
    pub fn uid(&self, schema: &RecordSchema) -> String {
        schema
            .identifiers
            .iter()
            .map(|field| match self.fields.get(field) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            })
            .collect::<Vec<_>>()
            .join(UID_SEPARATOR)
    }

    /// The attribute subset of this record's fields, in schema order.
    pub fn attributes(&self, schema: &RecordSchema) -> BTreeMap<String, Value> {
        schema
            .attributes
            .iter()
            .filter_map(|attr| {
                self.fields
                    .get(attr)
                    .map(|value| (attr.clone(), value.clone()))
            })
            .collect()
    }

    /// Apply an attribute patch, producing the updated record.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch names a field the schema does not
    /// declare as an attribute (identifier fields are never patchable).
    pub fn patched(&self, schema: &RecordSchema, patch: &BTreeMap<String, Value>) -> Result<Self> {
        let mut updated = self.clone();
        for (field, value) in patch {
            if !schema.is_attribute(field) {
                return Err(Error::UndeclaredField {
                    type_name: schema.name.clone(),
                    field: field.clone(),
                });
            }
            updated.fields.insert(field.clone(), value.clone());
        }
        Ok(updated)
    }
}
