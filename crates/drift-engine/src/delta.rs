//! Delta types: the structural difference between two loaded stores.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use drift_model::ParentRef;

/// One changed attribute: the target's current value and the source's value
/// that should replace it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttrChange {
    pub old: Value,
    pub new: Value,
}

/// Payload for a record that exists only in the source: the identifier
/// fields needed to construct it plus its full attribute set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateEntry {
    /// Identifier field values
    pub ids: BTreeMap<String, Value>,
    /// Full attribute set
    pub attrs: BTreeMap<String, Value>,
    /// Parent reference for child-type records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
}

/// Per-type difference node.
///
/// A given uid appears in at most one of `creates`/`updates`/`deletes`.
/// `children` holds nested deltas over declared child types, addressed by
/// parent uid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeDelta {
    pub creates: BTreeMap<String, CreateEntry>,
    pub updates: BTreeMap<String, BTreeMap<String, AttrChange>>,
    pub deletes: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, Delta>,
}

impl TypeDelta {
    /// Whether this node (including nested children) records no difference.
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty()
            && self.updates.is_empty()
            && self.deletes.is_empty()
            && self.children.values().all(Delta::is_empty)
    }
}

/// Structural difference between two loaded stores, keyed by record type.
///
/// Immutable once computed; consumed by the sync executor or the summary
/// reporter. All maps are BTreeMaps so iteration (and therefore rendering
/// and apply order) is lexicographic and repeatable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Delta {
    pub types: BTreeMap<String, TypeDelta>,
}

impl Delta {
    /// Whether no record of any type differs.
    pub fn is_empty(&self) -> bool {
        self.types.values().all(TypeDelta::is_empty)
    }

    /// Total creates/updates/deletes per record type, aggregated across
    /// nesting levels.
    pub fn counts(&self) -> BTreeMap<String, OpCounts> {
        let mut counts = BTreeMap::new();
        self.accumulate(&mut counts);
        counts
    }

    fn accumulate(&self, counts: &mut BTreeMap<String, OpCounts>) {
        for (type_name, node) in &self.types {
            let entry = counts.entry(type_name.clone()).or_default();
            entry.create += node.creates.len();
            entry.update += node.updates.len();
            entry.delete += node.deletes.len();
            for child in node.children.values() {
                child.accumulate(counts);
            }
        }
    }
}

/// Create/update/delete totals for one record type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpCounts {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_delta() -> Delta {
        let mut node = TypeDelta::default();
        node.creates.insert(
            "alice0".to_string(),
            CreateEntry {
                ids: BTreeMap::from([("username".to_string(), json!("alice0"))]),
                attrs: BTreeMap::from([("job".to_string(), json!("Engineer"))]),
                parent: None,
            },
        );
        node.updates.insert(
            "bob1".to_string(),
            BTreeMap::from([(
                "company".to_string(),
                AttrChange {
                    old: json!("OldCo"),
                    new: json!("NewCo"),
                },
            )]),
        );
        node.deletes.insert("carol2".to_string());

        Delta {
            types: BTreeMap::from([("employee".to_string(), node)]),
        }
    }

    #[test]
    fn test_empty_delta() {
        let delta = Delta {
            types: BTreeMap::from([("employee".to_string(), TypeDelta::default())]),
        };
        assert!(delta.is_empty());
    }

    #[test]
    fn test_counts() {
        let counts = sample_delta().counts();
        assert_eq!(
            counts["employee"],
            OpCounts {
                create: 1,
                update: 1,
                delete: 1
            }
        );
    }

    #[test]
    fn test_nested_children_counted() {
        let mut child_node = TypeDelta::default();
        child_node.deletes.insert("b-1".to_string());
        let child_delta = Delta {
            types: BTreeMap::from([("badge".to_string(), child_node)]),
        };

        let mut delta = sample_delta();
        delta
            .types
            .get_mut("employee")
            .unwrap()
            .children
            .insert("alice0".to_string(), child_delta);

        let counts = delta.counts();
        assert_eq!(counts["badge"].delete, 1);
        assert!(!delta.is_empty());
    }
}
