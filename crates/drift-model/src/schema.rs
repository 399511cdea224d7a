//! Record type schemas

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Schema for one record type.
///
/// Identifier fields form the unique key of a record within a type and
/// adapter; they are immutable once a record exists. Attribute fields are
/// the mutable remainder, compared for equality during diffing. `children`
/// names record types that are diffed and synced nested under a parent of
/// this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Type name (e.g. "employee")
    pub name: String,
    /// Ordered identifier field names
    pub identifiers: Vec<String>,
    /// Attribute field names
    pub attributes: Vec<String>,
    /// Child record type names, if any
    #[serde(default)]
    pub children: Vec<String>,
}

impl RecordSchema {
    /// Create a schema with no children.
    pub fn new(
        name: impl Into<String>,
        identifiers: Vec<String>,
        attributes: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            identifiers,
            attributes,
            children: Vec::new(),
        }
    }

    /// Declare child record types on this schema.
    pub fn with_children(mut self, children: Vec<String>) -> Self {
        self.children = children;
        self
    }

    /// Validate structural soundness of the schema itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema declares no identifier fields.
    pub fn validate(&self) -> Result<()> {
        if self.identifiers.is_empty() {
            return Err(Error::NoIdentifiers {
                type_name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Whether `field` is one of this schema's identifier fields.
    pub fn is_identifier(&self, field: &str) -> bool {
        self.identifiers.iter().any(|f| f == field)
    }

    /// Whether `field` is one of this schema's attribute fields.
    pub fn is_attribute(&self, field: &str) -> bool {
        self.attributes.iter().any(|f| f == field)
    }
}
