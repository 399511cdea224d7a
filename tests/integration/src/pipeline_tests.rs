//! Full pipeline runs: snapshot file -> diff -> apply -> report.

use std::sync::Arc;

use drift_engine::{Summary, SyncExecutor, SyncOptions, diff};
use drift_store::{JsonFileStore, StoreAdapter};
use drift_test_utils::fixtures::{
    badge, employee, employee_at, employee_schema, schemas_with_badges,
};
use drift_test_utils::store::{seeded_memory, snapshot_array, snapshot_by_type};

fn types() -> Vec<String> {
    vec!["employee".to_string()]
}

#[tokio::test]
async fn test_snapshot_to_memory_sync() {
    let snapshot = snapshot_array(&[employee_at("alice0", "NewCo"), employee("bob1")]);
    let local = JsonFileStore::new("local", snapshot.path(), &[employee_schema()]);
    local.load().await.unwrap();

    let target = Arc::new(
        seeded_memory(
            "remote",
            &[employee_schema()],
            vec![employee_at("bob1", "OldCo"), employee("carol2")],
        )
        .await,
    );

    let delta = diff(&local, target.as_ref(), &types()).unwrap();
    let executor = SyncExecutor::new(
        Arc::clone(&target) as Arc<dyn StoreAdapter>,
        SyncOptions::default(),
    );
    let report = executor.apply(&delta).await;
    assert!(report.is_clean());

    let settled = diff(&local, target.as_ref(), &types()).unwrap();
    assert!(settled.is_empty());
}

#[tokio::test]
async fn test_nested_snapshot_syncs_children_with_parents() {
    let snapshot = snapshot_by_type(&[
        ("employee", vec![employee("alice0")]),
        (
            "badge",
            vec![badge("b-1", "alice0", true), badge("b-2", "alice0", false)],
        ),
    ]);
    let local = JsonFileStore::new("local", snapshot.path(), &schemas_with_badges());
    local.load().await.unwrap();

    let target = Arc::new(seeded_memory("remote", &schemas_with_badges(), vec![]).await);

    let delta = diff(&local, target.as_ref(), &types()).unwrap();
    let executor = SyncExecutor::new(
        Arc::clone(&target) as Arc<dyn StoreAdapter>,
        SyncOptions::default(),
    );
    let report = executor.apply(&delta).await;

    assert!(report.is_clean());
    assert_eq!(target.len("employee"), 1);
    assert_eq!(target.len("badge"), 2);

    // Children carry their parent back-reference across the sync.
    let restored = target.get("badge", "b-1").unwrap();
    assert_eq!(restored.parent.unwrap().uid, "alice0");
}

#[tokio::test]
async fn test_cascading_delete_flows_from_snapshot() {
    let snapshot = snapshot_by_type(&[("employee", vec![]), ("badge", vec![])]);
    let local = JsonFileStore::new("local", snapshot.path(), &schemas_with_badges());
    local.load().await.unwrap();

    let target = Arc::new(
        seeded_memory(
            "remote",
            &schemas_with_badges(),
            vec![employee("carol2"), badge("b-9", "carol2", true)],
        )
        .await,
    );

    let delta = diff(&local, target.as_ref(), &types()).unwrap();
    let executor = SyncExecutor::new(
        Arc::clone(&target) as Arc<dyn StoreAdapter>,
        SyncOptions::default(),
    );
    let report = executor.apply(&delta).await;

    assert!(report.is_clean());
    assert!(target.is_empty());
}

#[tokio::test]
async fn test_report_summary_matches_applied_outcomes() {
    let snapshot = snapshot_array(&[employee("alice0")]);
    let local = JsonFileStore::new("local", snapshot.path(), &[employee_schema()]);
    local.load().await.unwrap();

    let target = Arc::new(seeded_memory("remote", &[employee_schema()], vec![]).await);

    let delta = diff(&local, target.as_ref(), &types()).unwrap();
    let executor = SyncExecutor::new(
        Arc::clone(&target) as Arc<dyn StoreAdapter>,
        SyncOptions::default(),
    );
    let report = executor.apply(&delta).await;

    let summary = Summary::of_report(&delta, &report);
    let rendered = summary.to_string();
    assert!(rendered.contains("employee: 1 create, 0 update, 0 delete"));
    assert!(rendered.contains("+ alice0"));
    assert!(rendered.contains("[applied]"));

    // The JSON form carries the same outcome.
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(
        json["types"]["employee"]["entries"][0]["outcome"]["status"],
        serde_json::json!("applied")
    );
}

#[tokio::test]
async fn test_reload_after_sync_stays_converged() {
    let snapshot = snapshot_array(&[employee("alice0"), employee("bob1")]);
    let local = JsonFileStore::new("local", snapshot.path(), &[employee_schema()]);
    local.load().await.unwrap();

    let target = Arc::new(seeded_memory("remote", &[employee_schema()], vec![]).await);
    let delta = diff(&local, target.as_ref(), &types()).unwrap();
    let executor = SyncExecutor::new(
        Arc::clone(&target) as Arc<dyn StoreAdapter>,
        SyncOptions::default(),
    );
    executor.apply(&delta).await;

    // A second load of the same snapshot changes nothing.
    local.load().await.unwrap();
    let settled = diff(&local, target.as_ref(), &types()).unwrap();
    assert!(settled.is_empty());
}
