//! The sync executor: applies a Delta to a target adapter.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use drift_model::Record;
use drift_store::StoreAdapter;

use crate::delta::{CreateEntry, Delta, TypeDelta};

/// Outcome reason tokens. Stable across releases; consumers match on them.
pub const REASON_TIMEOUT: &str = "timeout";
pub const REASON_CANCELLED: &str = "cancelled";
pub const REASON_PARENT_FAILED: &str = "parent_failed";
pub const REASON_UNAVAILABLE: &str = "adapter_unavailable";
pub const REASON_NOT_FOUND: &str = "not_found";
pub const REASON_ALREADY_EXISTS: &str = "already_exists";

/// Per-entry result of one apply operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    /// The operation reached the target
    Applied,
    /// The operation was attempted and rejected
    Failed(String),
    /// The operation was never attempted
    Skipped(String),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Knobs for one apply run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Upper bound on in-flight operations within one phase. Zero is
    /// treated as 1 (serial execution).
    pub max_concurrency: usize,
    /// Per-operation deadline; an elapsed call records `Failed("timeout")`.
    pub op_timeout: Duration,
    /// Cooperative cancellation signal, observed at phase barriers.
    pub cancel: Option<watch::Receiver<bool>>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            op_timeout: Duration::from_secs(30),
            cancel: None,
        }
    }
}

/// Per-type apply outcomes, mirroring the shape of the Delta that produced
/// them. Every Delta entry gets exactly one outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeReport {
    pub creates: BTreeMap<String, Outcome>,
    pub updates: BTreeMap<String, Outcome>,
    pub deletes: BTreeMap<String, Outcome>,
    /// Nested child outcomes, keyed by parent uid then child type.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, BTreeMap<String, TypeReport>>,
}

impl TypeReport {
    fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.creates
            .values()
            .chain(self.updates.values())
            .chain(self.deletes.values())
            .chain(
                self.children
                    .values()
                    .flat_map(|types| types.values().flat_map(|r| r.boxed_outcomes())),
            )
    }

    fn boxed_outcomes(&self) -> Box<dyn Iterator<Item = &Outcome> + '_> {
        Box::new(self.outcomes())
    }
}

/// Result of applying one Delta. Always returned, even when the run aborts
/// partway; `aborted` then names the reason and unattempted entries carry
/// `Skipped` outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub types: BTreeMap<String, TypeReport>,
    /// Set when a fatal adapter error stopped the run early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl SyncReport {
    /// Whether every entry applied and the run completed.
    pub fn is_clean(&self) -> bool {
        self.aborted.is_none()
            && self
                .types
                .values()
                .all(|report| report.outcomes().all(Outcome::is_applied))
    }
}

/// Applies a computed Delta to one target adapter.
///
/// Ordering guarantees: within each type, creates run before updates, and
/// all destructive operations run after all constructive ones, children
/// before parents. Entries within one phase run concurrently, bounded by
/// `max_concurrency`, with a barrier between phases.
pub struct SyncExecutor {
    target: Arc<dyn StoreAdapter>,
    options: SyncOptions,
}

struct ApplyState {
    aborted: Option<String>,
}

struct LevelOp {
    type_name: String,
    uid: String,
    kind: OpKind,
}

enum OpKind {
    Create(Record),
    Update(BTreeMap<String, Value>),
    Delete,
}

struct EntryResult {
    uid: String,
    outcome: Outcome,
    fatal: bool,
}

impl SyncExecutor {
    pub fn new(target: Arc<dyn StoreAdapter>, options: SyncOptions) -> Self {
        Self { target, options }
    }

    /// Apply `delta` to the target, returning an outcome for every entry.
    ///
    /// Never fails: entry-level errors become `Failed` outcomes and fatal
    /// adapter errors abort the run with the remaining entries `Skipped`.
    pub async fn apply(&self, delta: &Delta) -> SyncReport {
        let mut state = ApplyState { aborted: None };
        let mut types: BTreeMap<String, TypeReport> = BTreeMap::new();

        // Constructive pass: creates, then child creates/updates, then
        // updates, per type.
        for (type_name, node) in &delta.types {
            let report = self.constructive(type_name, node, &mut state).await;
            types.insert(type_name.clone(), report);
        }

        // Destructive pass: child deletes depth-first, then own deletes.
        for (type_name, node) in &delta.types {
            if let Some(report) = types.get_mut(type_name) {
                self.destructive(type_name, node, report, &mut state).await;
            }
        }

        if let Some(reason) = &state.aborted {
            warn!(target = self.target.name(), reason, "sync aborted early");
        }
        SyncReport {
            types,
            aborted: state.aborted,
        }
    }

    fn constructive<'a>(
        &'a self,
        type_name: &'a str,
        node: &'a TypeDelta,
        state: &'a mut ApplyState,
    ) -> Pin<Box<dyn Future<Output = TypeReport> + Send + 'a>> {
        Box::pin(async move {
            let mut report = TypeReport::default();

            let creates: Vec<LevelOp> = node
                .creates
                .iter()
                .map(|(uid, entry)| LevelOp {
                    type_name: type_name.to_string(),
                    uid: uid.clone(),
                    kind: OpKind::Create(build_record(type_name, entry)),
                })
                .collect();
            report.creates = self.run_level(creates, state).await;

            for (parent_uid, child_delta) in &node.children {
                let parent_create_failed = node.creates.contains_key(parent_uid)
                    && report.creates.get(parent_uid) != Some(&Outcome::Applied);

                let mut child_types = BTreeMap::new();
                for (child_type, child_node) in &child_delta.types {
                    let child_report = if parent_create_failed {
                        skip_all(child_node, REASON_PARENT_FAILED)
                    } else {
                        self.constructive(child_type, child_node, state).await
                    };
                    child_types.insert(child_type.clone(), child_report);
                }
                report.children.insert(parent_uid.clone(), child_types);
            }

            let updates: Vec<LevelOp> = node
                .updates
                .iter()
                .map(|(uid, changes)| LevelOp {
                    type_name: type_name.to_string(),
                    uid: uid.clone(),
                    kind: OpKind::Update(
                        changes
                            .iter()
                            .map(|(attr, change)| (attr.clone(), change.new.clone()))
                            .collect(),
                    ),
                })
                .collect();
            report.updates = self.run_level(updates, state).await;

            report
        })
    }

    fn destructive<'a>(
        &'a self,
        type_name: &'a str,
        node: &'a TypeDelta,
        report: &'a mut TypeReport,
        state: &'a mut ApplyState,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            for (parent_uid, child_delta) in &node.children {
                if let Some(child_types) = report.children.get_mut(parent_uid) {
                    for (child_type, child_node) in &child_delta.types {
                        if let Some(child_report) = child_types.get_mut(child_type) {
                            self.destructive(child_type, child_node, child_report, state)
                                .await;
                        }
                    }
                }
            }

            // Entries already settled (failed-parent subtrees) keep their
            // recorded outcome.
            let deletes: Vec<LevelOp> = node
                .deletes
                .iter()
                .filter(|uid| !report.deletes.contains_key(*uid))
                .map(|uid| LevelOp {
                    type_name: type_name.to_string(),
                    uid: uid.clone(),
                    kind: OpKind::Delete,
                })
                .collect();
            report.deletes.extend(self.run_level(deletes, state).await);
        })
    }

    /// Run one phase's operations concurrently and collect per-uid outcomes.
    /// This is the barrier granularity for cancellation and abort checks.
    async fn run_level(
        &self,
        ops: Vec<LevelOp>,
        state: &mut ApplyState,
    ) -> BTreeMap<String, Outcome> {
        let mut outcomes = BTreeMap::new();
        if ops.is_empty() {
            return outcomes;
        }

        if let Some(reason) = &state.aborted {
            let reason = reason.clone();
            for op in ops {
                outcomes.insert(op.uid, Outcome::Skipped(reason.clone()));
            }
            return outcomes;
        }
        if self.cancelled() {
            for op in ops {
                outcomes.insert(op.uid, Outcome::Skipped(REASON_CANCELLED.to_string()));
            }
            return outcomes;
        }

        debug!(
            target = self.target.name(),
            entries = ops.len(),
            "applying level"
        );

        // A zero bound would spawn nothing and mislabel every entry as
        // skipped; treat it as serial execution.
        let concurrency = self.options.max_concurrency.max(1);
        let mut queue: VecDeque<LevelOp> = ops.into();
        let mut tasks: JoinSet<EntryResult> = JoinSet::new();
        loop {
            while tasks.len() < concurrency && state.aborted.is_none() {
                let Some(op) = queue.pop_front() else { break };
                self.spawn_op(&mut tasks, op);
            }
            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok(result) => {
                    if result.fatal && state.aborted.is_none() {
                        state.aborted = Some(REASON_UNAVAILABLE.to_string());
                    }
                    outcomes.insert(result.uid, result.outcome);
                }
                Err(err) => {
                    error!(error = %err, "apply task did not complete");
                }
            }
        }

        // Entries never spawned because the adapter went away mid-level.
        for op in queue {
            outcomes.insert(op.uid, Outcome::Skipped(REASON_UNAVAILABLE.to_string()));
        }
        outcomes
    }

    fn spawn_op(&self, tasks: &mut JoinSet<EntryResult>, op: LevelOp) {
        let target = Arc::clone(&self.target);
        let op_timeout = self.options.op_timeout;
        tasks.spawn(async move {
            let LevelOp {
                type_name,
                uid,
                kind,
            } = op;
            let call = async {
                match kind {
                    OpKind::Create(record) => target.add(record).await,
                    OpKind::Update(patch) => target.update(&type_name, &uid, &patch).await,
                    OpKind::Delete => target.remove(&type_name, &uid, true).await,
                }
            };
            match timeout(op_timeout, call).await {
                Err(_) => EntryResult {
                    uid,
                    outcome: Outcome::Failed(REASON_TIMEOUT.to_string()),
                    fatal: false,
                },
                Ok(Ok(())) => EntryResult {
                    uid,
                    outcome: Outcome::Applied,
                    fatal: false,
                },
                Ok(Err(err)) => {
                    let fatal = err.is_fatal();
                    EntryResult {
                        uid,
                        outcome: Outcome::Failed(failure_reason(&err)),
                        fatal,
                    }
                }
            }
        });
    }

    fn cancelled(&self) -> bool {
        self.options.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

fn build_record(type_name: &str, entry: &CreateEntry) -> Record {
    let mut fields = entry.ids.clone();
    fields.extend(entry.attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
    Record {
        type_name: type_name.to_string(),
        fields,
        parent: entry.parent.clone(),
    }
}

fn failure_reason(err: &drift_store::Error) -> String {
    match err {
        drift_store::Error::NotFound { .. } => REASON_NOT_FOUND.to_string(),
        drift_store::Error::AlreadyExists { .. } => REASON_ALREADY_EXISTS.to_string(),
        drift_store::Error::Unavailable(_) => REASON_UNAVAILABLE.to_string(),
        other => other.to_string(),
    }
}

/// Mark every entry of a delta node, children included, as skipped.
fn skip_all(node: &TypeDelta, reason: &str) -> TypeReport {
    fn skipped<'a>(
        uids: impl Iterator<Item = &'a String>,
        reason: &str,
    ) -> BTreeMap<String, Outcome> {
        uids.map(|uid| (uid.clone(), Outcome::Skipped(reason.to_string())))
            .collect()
    }
    TypeReport {
        creates: skipped(node.creates.keys(), reason),
        updates: skipped(node.updates.keys(), reason),
        deletes: skipped(node.deletes.iter(), reason),
        children: node
            .children
            .iter()
            .map(|(parent_uid, child_delta)| {
                (
                    parent_uid.clone(),
                    child_delta
                        .types
                        .iter()
                        .map(|(child_type, child_node)| {
                            (child_type.clone(), skip_all(child_node, reason))
                        })
                        .collect(),
                )
            })
            .collect(),
    }
}
