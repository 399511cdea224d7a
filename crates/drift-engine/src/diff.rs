//! The diff engine: a pure computation over two loaded store indexes.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use drift_model::RecordSchema;
use drift_store::StoreAdapter;

use crate::delta::{AttrChange, CreateEntry, Delta, TypeDelta};
use crate::error::{Error, Result};

/// Compute the Delta that would make `target` match `source` for the given
/// top-level record types, recursing into declared children.
///
/// Both adapters must already be loaded; this function only reads their
/// indexes and never touches a backing store. Output iteration order is
/// lexicographic by uid, so repeated diffs over unchanged inputs render
/// byte-identically.
///
/// # Errors
///
/// Fails fast with `TypeMismatch` if the adapters disagree on any reachable
/// type's schema, or `UnknownType` if a type is missing from either adapter.
/// Schemas without identifier fields are rejected before any comparison.
/// No partial Delta is ever returned.
pub fn diff(
    source: &dyn StoreAdapter,
    target: &dyn StoreAdapter,
    types: &[String],
) -> Result<Delta> {
    verify_schemas(source, target, types)?;

    let delta = diff_types(source, target, types, None)?;
    debug!(
        source = source.name(),
        target = target.name(),
        empty = delta.is_empty(),
        "computed delta"
    );
    Ok(delta)
}

/// Check schema agreement for every type reachable from `types` through
/// children declarations, before any set algebra runs.
fn verify_schemas(
    source: &dyn StoreAdapter,
    target: &dyn StoreAdapter,
    types: &[String],
) -> Result<()> {
    let mut pending: Vec<String> = types.to_vec();
    let mut seen = BTreeSet::new();

    while let Some(type_name) = pending.pop() {
        if !seen.insert(type_name.clone()) {
            continue;
        }

        let source_schema = require_schema(source, &type_name)?;
        source_schema.validate()?;
        let target_schema = require_schema(target, &type_name)?;
        if source_schema != target_schema {
            return Err(Error::TypeMismatch {
                type_name,
                source_adapter: source.name().to_string(),
                target_adapter: target.name().to_string(),
            });
        }

        pending.extend(source_schema.children.iter().cloned());
    }
    Ok(())
}

fn require_schema(adapter: &dyn StoreAdapter, type_name: &str) -> Result<RecordSchema> {
    adapter.schema(type_name).ok_or_else(|| Error::UnknownType {
        type_name: type_name.to_string(),
        adapter: adapter.name().to_string(),
    })
}

/// Scope limiting a comparison to the children of one parent record.
type Scope<'a> = Option<(&'a str, &'a str)>;

fn diff_types(
    source: &dyn StoreAdapter,
    target: &dyn StoreAdapter,
    types: &[String],
    scope: Scope<'_>,
) -> Result<Delta> {
    let mut delta = Delta::default();
    for type_name in types {
        let node = diff_type(source, target, type_name, scope)?;
        delta.types.insert(type_name.clone(), node);
    }
    Ok(delta)
}

fn diff_type(
    source: &dyn StoreAdapter,
    target: &dyn StoreAdapter,
    type_name: &str,
    scope: Scope<'_>,
) -> Result<TypeDelta> {
    let schema = require_schema(source, type_name)?;

    let source_uids = scoped_uids(source, type_name, scope);
    let target_uids = scoped_uids(target, type_name, scope);

    let mut node = TypeDelta::default();

    // Present only in source: full payload becomes a create.
    for uid in source_uids.difference(&target_uids) {
        let record = source.get(type_name, uid)?;
        let ids: BTreeMap<String, Value> = schema
            .identifiers
            .iter()
            .filter_map(|field| record.fields.get(field).map(|v| (field.clone(), v.clone())))
            .collect();
        node.creates.insert(
            uid.clone(),
            CreateEntry {
                ids,
                attrs: record.attributes(&schema),
                parent: record.parent.clone(),
            },
        );
    }

    // Present only in target: the key is enough to delete.
    for uid in target_uids.difference(&source_uids) {
        node.deletes.insert(uid.clone());
    }

    // Present in both: attribute-by-attribute comparison.
    for uid in source_uids.intersection(&target_uids) {
        let source_record = source.get(type_name, uid)?;
        let target_record = target.get(type_name, uid)?;

        let mut changes = BTreeMap::new();
        for attr in &schema.attributes {
            // An attribute absent on one side compares as null.
            let new = source_record.fields.get(attr).cloned().unwrap_or(Value::Null);
            let old = target_record.fields.get(attr).cloned().unwrap_or(Value::Null);
            if new != old {
                changes.insert(attr.clone(), AttrChange { old, new });
            }
        }
        if !changes.is_empty() {
            node.updates.insert(uid.clone(), changes);
        }
    }

    // Recurse into declared children of every parent present on either
    // side: matched and created parents contribute child creates/updates,
    // deleted parents contribute child deletes.
    if !schema.children.is_empty() {
        for parent_uid in source_uids.union(&target_uids) {
            let child_delta = diff_types(
                source,
                target,
                &schema.children,
                Some((type_name, parent_uid)),
            )?;
            if !child_delta.is_empty() {
                node.children.insert(parent_uid.clone(), child_delta);
            }
        }
    }

    Ok(node)
}

fn scoped_uids(adapter: &dyn StoreAdapter, type_name: &str, scope: Scope<'_>) -> BTreeSet<String> {
    match scope {
        None => adapter.uids(type_name).into_iter().collect(),
        Some((parent_type, parent_uid)) => adapter
            .children_of(parent_type, parent_uid, type_name)
            .into_iter()
            .collect(),
    }
}
