//! End-to-end behavior of the offline layer against an in-memory remote.

use std::sync::Arc;
use std::time::Duration;

use gridsync_core::models::into_row;
use gridsync_core::remote::RemoteOperation;
use gridsync_core::{
    Connectivity, ConnectivityController, LocalStore, MemoryRemoteStore, Operation, RemoteError,
    Row, StoreLocation, SyncConfig, SyncOutcome,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

fn row(value: serde_json::Value) -> Row {
    into_row(value).unwrap()
}

async fn controller_with(
    location: StoreLocation,
    initial: Connectivity,
) -> (ConnectivityController, Arc<MemoryRemoteStore>) {
    let store = Arc::new(LocalStore::new(location));
    let remote = Arc::new(MemoryRemoteStore::new());
    let controller = ConnectivityController::new(
        store,
        remote.clone(),
        initial,
        SyncConfig::new().without_auto_sync(),
    )
    .await;
    (controller, remote)
}

async fn online_controller() -> (ConnectivityController, Arc<MemoryRemoteStore>) {
    controller_with(StoreLocation::InMemory, Connectivity::Online).await
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_insert_then_sync() {
    let (controller, remote) = online_controller().await;
    controller
        .record_pending_change(
            Operation::Insert,
            "orders",
            row(json!({"id": "o1", "amount": 10})),
            None,
        )
        .await
        .unwrap();

    let outcome = controller.request_sync().await;
    assert_eq!(
        outcome,
        SyncOutcome {
            success: true,
            synced_count: 1,
            failed_count: 0,
            errors: Vec::new(),
        }
    );
    assert_eq!(controller.status().pending_count, 0);
    assert_eq!(
        remote.row("orders", "o1").await,
        Some(row(json!({"id": "o1", "amount": 10})))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_conflicting_update_is_retained() {
    let (controller, remote) = online_controller().await;
    remote
        .seed(
            "orders",
            [row(json!({"id": "o1", "amount": 15, "updated_at": 200}))],
        )
        .await;
    let id = controller
        .record_pending_change(
            Operation::Update,
            "orders",
            row(json!({"id": "o1", "amount": 20})),
            Some(row(json!({"id": "o1", "amount": 10, "updated_at": 100}))),
        )
        .await
        .unwrap();

    let outcome = controller.request_sync().await;
    assert!(!outcome.success);
    assert_eq!(outcome.failed_count, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].change_id, Some(id));
    assert!(outcome.errors[0].reason.starts_with("Conflict"));

    let pending = controller.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    assert_eq!(controller.status().pending_count, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_offline_before_sync_makes_no_calls() {
    let (controller, remote) = online_controller().await;
    for id in ["o1", "o2", "o3"] {
        controller
            .record_pending_change(Operation::Insert, "orders", row(json!({"id": id})), None)
            .await
            .unwrap();
    }

    controller.handle_offline();
    let outcome = controller.request_sync().await;
    assert_eq!(
        outcome,
        SyncOutcome {
            success: false,
            synced_count: 0,
            failed_count: 0,
            errors: Vec::new(),
        }
    );
    assert!(remote.calls().await.is_empty());
    assert_eq!(controller.status().pending_count, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_sync_is_idempotent() {
    let (controller, remote) = online_controller().await;
    remote.seed("orders", [row(json!({"id": "o2"}))]).await;
    controller
        .record_pending_change(Operation::Insert, "orders", row(json!({"id": "o1"})), None)
        .await
        .unwrap();
    controller
        .record_pending_change(Operation::Delete, "orders", row(json!({"id": "o2"})), None)
        .await
        .unwrap();

    assert!(controller.request_sync().await.success);
    remote.clear_calls().await;

    let second = controller.request_sync().await;
    assert_eq!(second, SyncOutcome::empty());
    assert_eq!(controller.status().pending_count, 0);
    assert!(remote.calls().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn updates_to_the_same_row_apply_in_order() {
    let (controller, remote) = online_controller().await;
    remote
        .seed("orders", [row(json!({"id": "o1", "amount": 0}))])
        .await;

    for amount in 1..=3 {
        controller
            .record_pending_change(
                Operation::Update,
                "orders",
                row(json!({"id": "o1", "amount": amount})),
                None,
            )
            .await
            .unwrap();
    }

    let outcome = controller.request_sync().await;
    assert_eq!(outcome.synced_count, 3);

    let applied: Vec<_> = remote
        .calls()
        .await
        .into_iter()
        .filter(|call| call.operation == RemoteOperation::Update)
        .filter_map(|call| call.payload)
        .map(|payload| payload["amount"].clone())
        .collect();
    assert_eq!(applied, vec![json!(1), json!(2), json!(3)]);
    assert_eq!(remote.row("orders", "o1").await.unwrap()["amount"], json!(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn back_to_back_requests_drain_once() {
    let (controller, remote) = online_controller().await;
    controller
        .record_pending_change(Operation::Insert, "orders", row(json!({"id": "o1"})), None)
        .await
        .unwrap();

    let pause = remote.pause().await;
    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.request_sync().await }
    });
    tokio::time::timeout(Duration::from_secs(5), async {
        while remote.calls().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let second = controller.request_sync().await;
    assert_eq!(second, SyncOutcome::skipped());

    drop(pause);
    let first = first.await.unwrap();
    assert_eq!(first.synced_count, 1);
    assert_eq!(remote.calls().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_changes_are_retained_while_siblings_sync() {
    let (controller, remote) = online_controller().await;
    remote
        .seed(
            "orders",
            [row(json!({"id": "x", "amount": 1})), row(json!({"id": "y"}))],
        )
        .await;
    remote
        .fail_row(
            "orders",
            "x",
            RemoteError::Rejected {
                status: 422,
                message: "amount must be positive".to_string(),
            },
        )
        .await;

    let failing = controller
        .record_pending_change(
            Operation::Update,
            "orders",
            row(json!({"id": "x", "amount": -1})),
            None,
        )
        .await
        .unwrap();
    controller
        .record_pending_change(Operation::Insert, "orders", row(json!({"id": "z"})), None)
        .await
        .unwrap();
    controller
        .record_pending_change(Operation::Delete, "orders", row(json!({"id": "y"})), None)
        .await
        .unwrap();

    let outcome = controller.request_sync().await;
    assert_eq!(outcome.synced_count, 2);
    assert_eq!(outcome.failed_count, 1);
    assert!(!outcome.errors[0].retryable);

    let pending = controller.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, failing);
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(controller.status().pending_count, 1);
    assert!(remote.row("orders", "z").await.is_some());
    assert!(remote.row("orders", "y").await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_of_missing_row_counts_as_synced() {
    let (controller, _remote) = online_controller().await;
    controller
        .record_pending_change(Operation::Delete, "orders", row(json!({"id": "nope"})), None)
        .await
        .unwrap();

    let outcome = controller.request_sync().await;
    assert!(outcome.success);
    assert_eq!(outcome.synced_count, 1);
    assert!(outcome.errors.is_empty());
    assert!(controller.list_pending().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn update_applies_when_remote_is_not_newer() {
    let (controller, remote) = online_controller().await;
    remote
        .seed(
            "orders",
            [row(json!({"id": "o1", "amount": 10, "updated_at": 100}))],
        )
        .await;
    controller
        .record_pending_change(
            Operation::Update,
            "orders",
            row(json!({"id": "o1", "amount": 20})),
            Some(row(json!({"id": "o1", "amount": 10, "updated_at": 100}))),
        )
        .await
        .unwrap();

    assert!(controller.request_sync().await.success);
    assert_eq!(remote.row("orders", "o1").await.unwrap()["amount"], json!(20));
}

#[tokio::test(flavor = "multi_thread")]
async fn queued_changes_survive_restart() {
    let tmp = tempdir().unwrap();
    let location = StoreLocation::path(tmp.path().join("gridsync.db"));

    {
        let (controller, _remote) = controller_with(location.clone(), Connectivity::Offline).await;
        controller
            .record_pending_change(Operation::Insert, "orders", row(json!({"id": "o1"})), None)
            .await
            .unwrap();
        controller
            .cache_rows("orders", &[row(json!({"id": "o0", "amount": 5}))])
            .await
            .unwrap();
        controller.store().close().await;
    }

    let (controller, remote) = controller_with(location, Connectivity::Offline).await;
    let status = controller.status();
    assert!(status.is_ready);
    assert_eq!(status.pending_count, 1);
    assert_eq!(
        controller.read_cached_rows("orders").await.unwrap(),
        vec![row(json!({"id": "o0", "amount": 5}))]
    );

    controller.handle_online();
    let mut receiver = controller.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        receiver.wait_for(|status| status.pending_count == 0 && !status.is_syncing),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(remote.row("orders", "o1").await.is_some());
}
