//! End-to-end properties of the diff/sync pipeline over in-memory stores.
//!
//! Covers idempotence, convergence, the creates/updates/deletes partition,
//! no-op stability, and entry-failure containment.

use std::collections::BTreeSet;
use std::sync::Arc;

use rstest::rstest;
use serde_json::json;

use drift_engine::{Outcome, Summary, SyncExecutor, SyncOptions, diff};
use drift_store::{MemoryStore, StoreAdapter};
use drift_test_utils::fixtures::{employee, employee_at, employee_schema};
use drift_test_utils::store::seeded_memory;

fn types() -> Vec<String> {
    vec!["employee".to_string()]
}

async fn store(records: Vec<drift_model::Record>) -> MemoryStore {
    seeded_memory("memory", &[employee_schema()], records).await
}

#[tokio::test]
async fn test_diff_is_idempotent_with_identical_rendering() {
    let source = store(vec![employee_at("alice0", "NewCo"), employee("bob1")]).await;
    let target = store(vec![employee_at("bob1", "OldCo"), employee("carol2")]).await;

    let first = diff(&source, &target, &types()).unwrap();
    let second = diff(&source, &target, &types()).unwrap();

    assert_eq!(first, second);
    // Byte-identical rendering, not just structural equality.
    assert_eq!(
        Summary::of_delta(&first).to_string(),
        Summary::of_delta(&second).to_string()
    );
}

#[tokio::test]
async fn test_sync_converges_then_rediff_is_empty() {
    let source = store(vec![
        employee_at("alice0", "NewCo"),
        employee_at("bob1", "NewCo"),
        employee("dave3"),
    ])
    .await;
    let target = Arc::new(
        store(vec![
            employee_at("bob1", "OldCo"),
            employee("carol2"),
            employee("dave3"),
        ])
        .await,
    );

    let delta = diff(&source, target.as_ref(), &types()).unwrap();
    let executor = SyncExecutor::new(
        Arc::clone(&target) as Arc<dyn StoreAdapter>,
        SyncOptions::default(),
    );
    let report = executor.apply(&delta).await;
    assert!(report.is_clean());

    let settled = diff(&source, target.as_ref(), &types()).unwrap();
    assert!(settled.is_empty());
}

#[tokio::test]
async fn test_partition_invariant_holds() {
    let source = store(vec![
        employee("alice0"),
        employee_at("bob1", "NewCo"),
        employee("dave3"),
    ])
    .await;
    let target = store(vec![
        employee_at("bob1", "OldCo"),
        employee("carol2"),
        employee("dave3"),
    ])
    .await;

    let delta = diff(&source, &target, &types()).unwrap();
    let node = &delta.types["employee"];

    let creates: BTreeSet<_> = node.creates.keys().collect();
    let updates: BTreeSet<_> = node.updates.keys().collect();
    let deletes: BTreeSet<_> = node.deletes.iter().collect();

    assert!(creates.is_disjoint(&updates));
    assert!(creates.is_disjoint(&deletes));
    assert!(updates.is_disjoint(&deletes));

    // Source-only uids land in creates, target-only uids in deletes.
    assert!(creates.contains(&"alice0".to_string()));
    assert!(deletes.contains(&"carol2".to_string()));
    // Identical records generate no entry at all.
    assert!(!updates.contains(&"dave3".to_string()));
}

#[tokio::test]
async fn test_noop_stability_for_identical_stores() {
    let records = vec![employee("alice0"), employee("bob1")];
    let source = store(records.clone()).await;
    let target = store(records).await;

    let delta = diff(&source, &target, &types()).unwrap();
    assert!(delta.is_empty());

    let summary = Summary::of_delta(&delta);
    assert!(summary.is_empty());
    assert_eq!(summary.to_string(), "no differences\n");
}

// One scenario per (source, target, expected-entry) triple.
#[rstest]
#[case::source_only_record_creates(vec!["alice0"], vec![], "create", "alice0")]
#[case::target_only_record_deletes(vec![], vec!["carol2"], "delete", "carol2")]
#[tokio::test]
async fn test_membership_scenarios(
    #[case] source_uids: Vec<&str>,
    #[case] target_uids: Vec<&str>,
    #[case] expected_op: &str,
    #[case] expected_uid: &str,
) {
    let source = store(source_uids.into_iter().map(employee).collect()).await;
    let target = store(target_uids.into_iter().map(employee).collect()).await;

    let delta = diff(&source, &target, &types()).unwrap();
    let node = &delta.types["employee"];

    match expected_op {
        "create" => assert!(node.creates.contains_key(expected_uid)),
        "delete" => assert!(node.deletes.contains(expected_uid)),
        other => panic!("unexpected op {other}"),
    }
    let counts = delta.counts();
    assert_eq!(
        counts["employee"].create + counts["employee"].update + counts["employee"].delete,
        1
    );
}

#[tokio::test]
async fn test_changed_attribute_reports_old_and_new() {
    let source = store(vec![employee_at("bob1", "NewCo")]).await;
    let target = store(vec![employee_at("bob1", "OldCo")]).await;

    let delta = diff(&source, &target, &types()).unwrap();
    let changes = &delta.types["employee"].updates["bob1"];
    assert_eq!(changes["company"].old, json!("OldCo"));
    assert_eq!(changes["company"].new, json!("NewCo"));
}

#[tokio::test]
async fn test_failed_delete_does_not_block_siblings() {
    let source = store(vec![employee("alice0")]).await;
    let target = Arc::new(store(vec![employee("bob1"), employee("carol2")]).await);

    let delta = diff(&source, target.as_ref(), &types()).unwrap();
    // carol2 disappears between diff and apply, so its delete fails.
    target.remove("employee", "carol2", false).await.unwrap();

    let executor = SyncExecutor::new(
        Arc::clone(&target) as Arc<dyn StoreAdapter>,
        SyncOptions::default(),
    );
    let report = executor.apply(&delta).await;

    let node = &report.types["employee"];
    assert_eq!(node.deletes["carol2"], Outcome::Failed("not_found".to_string()));
    // Siblings still applied.
    assert_eq!(node.deletes["bob1"], Outcome::Applied);
    assert_eq!(node.creates["alice0"], Outcome::Applied);
    assert!(report.aborted.is_none());
}

#[tokio::test]
async fn test_empty_datasets_print_zero_counts() {
    let source = store(vec![]).await;
    let target = store(vec![]).await;

    let delta = diff(&source, &target, &types()).unwrap();
    let counts = delta.counts();
    assert_eq!(counts["employee"].create, 0);
    assert_eq!(counts["employee"].update, 0);
    assert_eq!(counts["employee"].delete, 0);
}
