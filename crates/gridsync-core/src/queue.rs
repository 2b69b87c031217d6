//! Pending change queue
//!
//! The queue is the `pending_changes` collection of the local store viewed as
//! an ordered log. A change leaves it only after the remote store confirmed it.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{sort_for_replay, Operation, PendingChange, PendingChangeId, Row};
use crate::store::{LocalStore, StoreCollection};
use crate::util::{compact_reason, unix_timestamp_millis};

/// Ordered queue of local mutations awaiting remote confirmation
#[derive(Clone)]
pub struct PendingQueue {
    store: Arc<LocalStore>,
}

impl PendingQueue {
    /// Create a queue over the given store
    pub const fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// The underlying store
    pub const fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Record a new unsynced change and return its id
    pub async fn enqueue(
        &self,
        operation: Operation,
        collection: &str,
        payload: Row,
        prior_payload: Option<Row>,
    ) -> Result<PendingChangeId> {
        let collection = collection.trim();
        if collection.is_empty() {
            return Err(Error::InvalidInput(
                "collection name must not be empty".to_string(),
            ));
        }

        let change = PendingChange::new(operation, collection, payload, prior_payload);
        self.store.put_pending_change(&change).await?;
        tracing::debug!("Queued {} on {} as {}", operation, collection, change.id);
        Ok(change.id)
    }

    /// Get one change by id
    pub async fn get(&self, id: &PendingChangeId) -> Result<Option<PendingChange>> {
        self.store.get_pending_change(id).await
    }

    /// All unsynced changes in replay order
    pub async fn list_unsynced(&self) -> Result<Vec<PendingChange>> {
        let mut changes = self.store.pending_changes_by_synced(false).await?;
        sort_for_replay(&mut changes);
        Ok(changes)
    }

    /// Flag a change as confirmed by the remote store, keeping it in place
    pub async fn mark_synced(&self, id: &PendingChangeId) -> Result<()> {
        let mut change = self.require(id).await?;
        change.synced = true;
        self.store.put_pending_change(&change).await
    }

    /// Record a failed replay attempt. Queue order is unaffected.
    pub async fn record_failure(&self, id: &PendingChangeId, reason: &str) -> Result<()> {
        let mut change = self.require(id).await?;
        change.attempts = change.attempts.saturating_add(1);
        change.last_attempt_at = Some(unix_timestamp_millis());
        change.last_error = Some(compact_reason(reason));
        self.store.put_pending_change(&change).await
    }

    /// Delete a change, returning whether it existed
    pub async fn remove(&self, id: &PendingChangeId) -> Result<bool> {
        self.store.delete_pending_change(id).await
    }

    /// Number of unsynced changes
    pub async fn count_unsynced(&self) -> Result<usize> {
        self.store.count_pending_changes(false).await
    }

    /// Drop every queued change, synced or not
    pub async fn clear(&self) -> Result<usize> {
        self.store.clear(StoreCollection::PendingChanges).await
    }

    async fn require(&self, id: &PendingChangeId) -> Result<PendingChange> {
        self.store
            .get_pending_change(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("pending change {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreLocation;
    use crate::models::into_row;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        into_row(value).unwrap()
    }

    async fn setup() -> PendingQueue {
        let store = LocalStore::open(StoreLocation::InMemory).await.unwrap();
        PendingQueue::new(Arc::new(store))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enqueue_creates_unsynced_change() {
        let queue = setup().await;
        let id = queue
            .enqueue(Operation::Insert, "orders", row(json!({"id": "o1"})), None)
            .await
            .unwrap();

        let change = queue.get(&id).await.unwrap().unwrap();
        assert!(!change.synced);
        assert_eq!(change.operation, Operation::Insert);
        assert_eq!(change.collection, "orders");
        assert_eq!(queue.count_unsynced().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enqueue_rejects_blank_collection() {
        let queue = setup().await;
        let result = queue
            .enqueue(Operation::Insert, "  ", row(json!({"id": "o1"})), None)
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_unsynced_in_creation_order() {
        let queue = setup().await;
        let mut ids = Vec::new();
        for amount in 0..5 {
            ids.push(
                queue
                    .enqueue(
                        Operation::Update,
                        "orders",
                        row(json!({"id": "o1", "amount": amount})),
                        None,
                    )
                    .await
                    .unwrap(),
            );
        }

        let listed: Vec<_> = queue
            .list_unsynced()
            .await
            .unwrap()
            .into_iter()
            .map(|change| change.id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_synced_then_remove() {
        let queue = setup().await;
        let id = queue
            .enqueue(Operation::Delete, "orders", row(json!({"id": "o1"})), None)
            .await
            .unwrap();

        queue.mark_synced(&id).await.unwrap();
        assert_eq!(queue.count_unsynced().await.unwrap(), 0);
        assert!(queue.list_unsynced().await.unwrap().is_empty());
        // Confirmed but not yet cleaned up
        assert!(queue.get(&id).await.unwrap().unwrap().synced);

        assert!(queue.remove(&id).await.unwrap());
        assert!(queue.get(&id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_synced_missing_change() {
        let queue = setup().await;
        let result = queue.mark_synced(&PendingChangeId::new()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_failure_keeps_order() {
        let queue = setup().await;
        let first = queue
            .enqueue(Operation::Insert, "orders", row(json!({"id": "a"})), None)
            .await
            .unwrap();
        let second = queue
            .enqueue(Operation::Insert, "orders", row(json!({"id": "b"})), None)
            .await
            .unwrap();

        queue.record_failure(&first, "HTTP 503").await.unwrap();
        queue.record_failure(&first, "HTTP 503").await.unwrap();

        let listed = queue.list_unsynced().await.unwrap();
        assert_eq!(listed[0].id, first);
        assert_eq!(listed[0].attempts, 2);
        assert_eq!(listed[0].last_error.as_deref(), Some("HTTP 503"));
        assert!(listed[0].last_attempt_at.is_some());
        assert_eq!(listed[1].id, second);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_removes_everything() {
        let queue = setup().await;
        let id = queue
            .enqueue(Operation::Insert, "orders", row(json!({"id": "a"})), None)
            .await
            .unwrap();
        queue
            .enqueue(Operation::Insert, "orders", row(json!({"id": "b"})), None)
            .await
            .unwrap();
        queue.mark_synced(&id).await.unwrap();

        assert_eq!(queue.clear().await.unwrap(), 2);
        assert_eq!(queue.count_unsynced().await.unwrap(), 0);
    }
}
