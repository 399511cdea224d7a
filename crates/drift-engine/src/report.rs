//! Human- and machine-readable summaries of deltas and sync runs.
//!
//! Rendering is deterministic: types and uids come out of BTreeMaps, so the
//! same input always produces byte-identical text.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::delta::{AttrChange, Delta, TypeDelta};
use crate::executor::{Outcome, SyncReport, TypeReport};

/// The operation a summary entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Create,
    Update,
    Delete,
}

impl Op {
    fn marker(self) -> char {
        match self {
            Op::Create => '+',
            Op::Update => '~',
            Op::Delete => '-',
        }
    }
}

/// One record-level line in a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    pub op: Op,
    pub uid: String,
    /// Parent uid for entries nested under a parent record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Full attribute payload; creates only.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, Value>,
    /// Old/new attribute pairs; updates only.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub changes: BTreeMap<String, AttrChange>,
    /// Apply outcome; present only for summaries of a sync run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

/// Per-type section: operation counts plus itemised entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    pub entries: Vec<EntrySummary>,
}

/// Flat summary of a Delta or of a completed sync run.
///
/// Child-type entries are folded into their own type's section with the
/// parent uid noted, so every record type reads as one block regardless of
/// nesting depth.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub types: BTreeMap<String, TypeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl Summary {
    /// Summarise a Delta before (or instead of) applying it.
    pub fn of_delta(delta: &Delta) -> Self {
        let mut summary = Summary::default();
        collect_delta(delta, None, None, &mut summary.types);
        summary.sort_entries();
        summary
    }

    /// Summarise a sync run, pairing each Delta entry with its outcome.
    pub fn of_report(delta: &Delta, report: &SyncReport) -> Self {
        let mut summary = Summary {
            aborted: report.aborted.clone(),
            ..Summary::default()
        };
        collect_delta(delta, Some(report), None, &mut summary.types);
        summary.sort_entries();
        summary
    }

    /// Whether there is nothing to do or nothing was done.
    pub fn is_empty(&self) -> bool {
        self.types.values().all(|t| t.entries.is_empty())
    }

    fn sort_entries(&mut self) {
        for section in self.types.values_mut() {
            section
                .entries
                .sort_by(|a, b| a.op.cmp(&b.op).then_with(|| a.uid.cmp(&b.uid)));
        }
    }
}

fn collect_delta(
    delta: &Delta,
    report: Option<&SyncReport>,
    parent: Option<&str>,
    types: &mut BTreeMap<String, TypeSummary>,
) {
    for (type_name, node) in &delta.types {
        let type_report = report.and_then(|r| r.types.get(type_name));
        collect_node(type_name, node, type_report, parent, types);
    }
}

fn collect_node(
    type_name: &str,
    node: &TypeDelta,
    report: Option<&TypeReport>,
    parent: Option<&str>,
    types: &mut BTreeMap<String, TypeSummary>,
) {
    {
        let section = types.entry(type_name.to_string()).or_default();
        section.create += node.creates.len();
        section.update += node.updates.len();
        section.delete += node.deletes.len();

        for (uid, entry) in &node.creates {
            let outcome = lookup(report, |r| &r.creates, uid);
            tally(section, outcome.as_ref());
            section.entries.push(EntrySummary {
                op: Op::Create,
                uid: uid.clone(),
                parent: entry
                    .parent
                    .as_ref()
                    .map(|p| p.uid.clone())
                    .or_else(|| parent.map(str::to_string)),
                attrs: entry.attrs.clone(),
                changes: BTreeMap::new(),
                outcome,
            });
        }
        for (uid, changes) in &node.updates {
            let outcome = lookup(report, |r| &r.updates, uid);
            tally(section, outcome.as_ref());
            section.entries.push(EntrySummary {
                op: Op::Update,
                uid: uid.clone(),
                parent: parent.map(str::to_string),
                attrs: BTreeMap::new(),
                changes: changes.clone(),
                outcome,
            });
        }
        for uid in &node.deletes {
            let outcome = lookup(report, |r| &r.deletes, uid);
            tally(section, outcome.as_ref());
            section.entries.push(EntrySummary {
                op: Op::Delete,
                uid: uid.clone(),
                parent: parent.map(str::to_string),
                attrs: BTreeMap::new(),
                changes: BTreeMap::new(),
                outcome,
            });
        }
    }

    for (parent_uid, child_delta) in &node.children {
        for (child_type, child_node) in &child_delta.types {
            let child_report = report
                .and_then(|r| r.children.get(parent_uid))
                .and_then(|c| c.get(child_type));
            collect_node(child_type, child_node, child_report, Some(parent_uid), types);
        }
    }
}

fn lookup(
    report: Option<&TypeReport>,
    section: impl Fn(&TypeReport) -> &BTreeMap<String, Outcome>,
    uid: &str,
) -> Option<Outcome> {
    report.and_then(|r| section(r).get(uid).cloned())
}

fn tally(section: &mut TypeSummary, outcome: Option<&Outcome>) {
    let Some(outcome) = outcome else { return };
    let slot = match outcome {
        Outcome::Applied => &mut section.applied,
        Outcome::Failed(_) => &mut section.failed,
        Outcome::Skipped(_) => &mut section.skipped,
    };
    *slot = Some(slot.unwrap_or(0) + 1);
    // Zero the sibling counters so report summaries always carry all three.
    for other in [
        &mut section.applied,
        &mut section.failed,
        &mut section.skipped,
    ] {
        other.get_or_insert(0);
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() && self.aborted.is_none() {
            return writeln!(f, "no differences");
        }

        for (type_name, section) in &self.types {
            if section.entries.is_empty() {
                writeln!(f, "{type_name}: in sync")?;
                continue;
            }

            write!(
                f,
                "{type_name}: {} create, {} update, {} delete",
                section.create, section.update, section.delete
            )?;
            if let (Some(applied), Some(failed), Some(skipped)) =
                (section.applied, section.failed, section.skipped)
            {
                write!(f, " ({applied} applied, {failed} failed, {skipped} skipped)")?;
            }
            writeln!(f)?;

            for entry in &section.entries {
                write!(f, "  {} {}", entry.op.marker(), entry.uid)?;
                if let Some(parent) = &entry.parent {
                    write!(f, " (parent {parent})")?;
                }
                for (attr, value) in &entry.attrs {
                    write!(f, " {attr}={value}")?;
                }
                for (attr, change) in &entry.changes {
                    write!(f, " {attr}: {} -> {}", change.old, change.new)?;
                }
                match &entry.outcome {
                    Some(Outcome::Applied) => write!(f, " [applied]")?,
                    Some(Outcome::Failed(reason)) => write!(f, " [failed: {reason}]")?,
                    Some(Outcome::Skipped(reason)) => write!(f, " [skipped: {reason}]")?,
                    None => {}
                }
                writeln!(f)?;
            }
        }

        if let Some(reason) = &self.aborted {
            writeln!(f, "aborted: {reason}")?;
        }
        Ok(())
    }
}
