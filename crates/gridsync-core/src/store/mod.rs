//! Durable local store
//!
//! One libSQL database holding two independent collections: cached remote rows
//! for offline reads and pending changes for offline writes. The handle is
//! shared by the queue, the sync engine, and the controller; production code
//! is expected to construct exactly one per database file.

use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::config::StoreLocation;
use crate::db::{
    CachedRowRepository, Database, LibSqlCachedRowRepository, LibSqlPendingChangeRepository,
    PendingChangeRepository,
};
use crate::error::{Error, Result};
use crate::models::{row_id, CachedRow, PendingChange, PendingChangeId, Row, StorageEstimate};
use crate::util::unix_timestamp_millis;

/// Named record collections held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCollection {
    /// Read-side cache of remote rows
    CachedRows,
    /// Local mutations awaiting remote confirmation
    PendingChanges,
}

/// Handle to the durable local store
pub struct LocalStore {
    location: StoreLocation,
    db: Mutex<Option<Database>>,
}

impl LocalStore {
    /// Create an uninitialized handle; call [`LocalStore::init`] before use.
    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            db: Mutex::new(None),
        }
    }

    /// Create and initialize a handle in one step
    pub async fn open(location: StoreLocation) -> Result<Self> {
        let store = Self::new(location);
        store.init().await?;
        Ok(store)
    }

    /// Where this store keeps its data
    pub const fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Open the backend and run migrations.
    ///
    /// Idempotent. Concurrent callers wait for the first initialization and
    /// then observe its result. A failed initialization leaves the store
    /// uninitialized so a later call can retry.
    pub async fn init(&self) -> Result<()> {
        let mut slot = self.db.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        let opened = match &self.location {
            StoreLocation::Path(path) => Database::open(path).await,
            StoreLocation::InMemory => Database::open_in_memory().await,
        };

        match opened {
            Ok(db) => {
                *slot = Some(db);
                tracing::info!("Local store ready at {}", self.location);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(
                    "Failed to open local store at {}: {}",
                    self.location,
                    error
                );
                Err(Error::StorageUnavailable(error.to_string()))
            }
        }
    }

    /// Whether `init` has completed successfully and the store is open
    pub async fn is_ready(&self) -> bool {
        self.db.lock().await.is_some()
    }

    /// Release the backend. Later operations fail until `init` runs again.
    pub async fn close(&self) {
        if self.db.lock().await.take().is_some() {
            tracing::debug!("Closed local store at {}", self.location);
        }
    }

    async fn database(&self) -> Result<MappedMutexGuard<'_, Database>> {
        let guard = self.db.lock().await;
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| {
            Error::StorageUnavailable(format!(
                "local store at {} is not initialized",
                self.location
            ))
        })
    }

    // Pending changes

    /// Insert or replace a pending change by id
    pub async fn put_pending_change(&self, change: &PendingChange) -> Result<()> {
        let db = self.database().await?;
        LibSqlPendingChangeRepository::new(db.connection())
            .put(change)
            .await
    }

    /// Get a pending change by id
    pub async fn get_pending_change(&self, id: &PendingChangeId) -> Result<Option<PendingChange>> {
        let db = self.database().await?;
        LibSqlPendingChangeRepository::new(db.connection())
            .get(id)
            .await
    }

    /// All pending changes with the given `synced` flag
    pub async fn pending_changes_by_synced(&self, synced: bool) -> Result<Vec<PendingChange>> {
        let db = self.database().await?;
        LibSqlPendingChangeRepository::new(db.connection())
            .list_by_synced(synced)
            .await
    }

    /// Delete a pending change, returning whether it existed
    pub async fn delete_pending_change(&self, id: &PendingChangeId) -> Result<bool> {
        let db = self.database().await?;
        LibSqlPendingChangeRepository::new(db.connection())
            .delete(id)
            .await
    }

    /// Count pending changes with the given `synced` flag
    pub async fn count_pending_changes(&self, synced: bool) -> Result<usize> {
        let db = self.database().await?;
        LibSqlPendingChangeRepository::new(db.connection())
            .count_by_synced(synced)
            .await
    }

    // Cached rows

    /// Cache rows of a collection, overwriting any previous copy per row id.
    ///
    /// Every row must carry `id_field`; otherwise nothing is written.
    pub async fn put_cached_rows(&self, collection: &str, rows: &[Row], id_field: &str) -> Result<()> {
        let collection = validate_collection(collection)?;
        let cached_at = unix_timestamp_millis();
        let cached = rows
            .iter()
            .map(|row| {
                let id = row_id(row, id_field).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "cannot cache a {collection} row without '{id_field}'"
                    ))
                })?;
                Ok(CachedRow {
                    collection: collection.to_string(),
                    row_id: id,
                    data: row.clone(),
                    cached_at,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let db = self.database().await?;
        LibSqlCachedRowRepository::new(db.connection())
            .put_many(&cached)
            .await?;
        tracing::debug!("Cached {} {} rows", cached.len(), collection);
        Ok(())
    }

    /// All cached rows of a collection
    pub async fn cached_rows(&self, collection: &str) -> Result<Vec<CachedRow>> {
        let collection = validate_collection(collection)?;
        let db = self.database().await?;
        LibSqlCachedRowRepository::new(db.connection())
            .list_by_collection(collection)
            .await
    }

    /// Delete one cached row, returning whether it existed
    pub async fn delete_cached_row(&self, collection: &str, row_id: &str) -> Result<bool> {
        let collection = validate_collection(collection)?;
        let db = self.database().await?;
        LibSqlCachedRowRepository::new(db.connection())
            .delete(collection, row_id)
            .await
    }

    /// Count cached rows of a collection
    pub async fn count_cached_rows(&self, collection: &str) -> Result<usize> {
        let collection = validate_collection(collection)?;
        let db = self.database().await?;
        LibSqlCachedRowRepository::new(db.connection())
            .count_by_collection(collection)
            .await
    }

    /// Delete all cached rows of one table/collection
    pub async fn clear_cached_collection(&self, collection: &str) -> Result<usize> {
        let collection = validate_collection(collection)?;
        let db = self.database().await?;
        LibSqlCachedRowRepository::new(db.connection())
            .clear_collection(collection)
            .await
    }

    // Whole-store operations

    /// Empty one record collection, returning how many records were removed
    pub async fn clear(&self, collection: StoreCollection) -> Result<usize> {
        let db = self.database().await?;
        let removed = match collection {
            StoreCollection::CachedRows => {
                LibSqlCachedRowRepository::new(db.connection()).clear().await?
            }
            StoreCollection::PendingChanges => {
                LibSqlPendingChangeRepository::new(db.connection())
                    .clear()
                    .await?
            }
        };
        tracing::info!("Cleared {removed} records from {collection:?}");
        Ok(removed)
    }

    /// Empty every collection
    pub async fn clear_all(&self) -> Result<()> {
        self.clear(StoreCollection::CachedRows).await?;
        self.clear(StoreCollection::PendingChanges).await?;
        Ok(())
    }

    /// Storage usage reported by the backend
    pub async fn storage_estimate(&self) -> Result<StorageEstimate> {
        let db = self.database().await?;
        db.storage_estimate().await
    }
}

fn validate_collection(collection: &str) -> Result<&str> {
    let collection = collection.trim();
    if collection.is_empty() {
        return Err(Error::InvalidInput(
            "collection name must not be empty".to_string(),
        ));
    }
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{into_row, Operation};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn row(value: serde_json::Value) -> Row {
        into_row(value).unwrap()
    }

    async fn open_memory() -> LocalStore {
        LocalStore::open(StoreLocation::InMemory).await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_operations_require_init() {
        let store = LocalStore::new(StoreLocation::InMemory);
        assert!(!store.is_ready().await);

        let error = store.count_pending_changes(false).await.unwrap_err();
        assert!(error.is_storage_unavailable());
        let error = store.cached_rows("orders").await.unwrap_err();
        assert!(error.is_storage_unavailable());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_init_is_shared() {
        let store = Arc::new(LocalStore::new(StoreLocation::InMemory));

        let first = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.init().await }
        });
        let second = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.init().await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        // A second open would have dropped the first in-memory database.
        let change = PendingChange::new(Operation::Insert, "orders", row(json!({"id": "o1"})), None);
        store.put_pending_change(&change).await.unwrap();
        store.init().await.unwrap();
        assert_eq!(store.count_pending_changes(false).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_init_can_be_retried() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = LocalStore::new(StoreLocation::path(blocker.join("store.db")));
        let error = store.init().await.unwrap_err();
        assert!(error.is_storage_unavailable());
        assert!(!store.is_ready().await);

        std::fs::remove_file(&blocker).unwrap();
        store.init().await.unwrap();
        assert!(store.is_ready().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pending_changes_survive_reopen() {
        let tmp = tempdir().unwrap();
        let location = StoreLocation::path(tmp.path().join("gridsync.db"));

        let change = PendingChange::new(
            Operation::Update,
            "orders",
            row(json!({"id": "o1", "amount": 20})),
            Some(row(json!({"id": "o1", "amount": 10, "updated_at": 100}))),
        );

        let store = LocalStore::open(location.clone()).await.unwrap();
        store.put_pending_change(&change).await.unwrap();
        store.close().await;
        assert!(store.count_pending_changes(false).await.is_err());

        let reopened = LocalStore::open(location).await.unwrap();
        let restored = reopened.get_pending_change(&change.id).await.unwrap();
        assert_eq!(restored, Some(change));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cached_rows_are_grouped_by_collection() {
        let store = open_memory().await;

        store
            .put_cached_rows(
                "orders",
                &[row(json!({"id": "o1", "amount": 10})), row(json!({"id": 2}))],
                "id",
            )
            .await
            .unwrap();
        store
            .put_cached_rows("customers", &[row(json!({"id": "c1"}))], "id")
            .await
            .unwrap();

        let orders = store.cached_rows("orders").await.unwrap();
        let ids: Vec<_> = orders.iter().map(|cached| cached.row_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "o1"]);
        assert_eq!(store.count_cached_rows("customers").await.unwrap(), 1);

        assert_eq!(store.clear_cached_collection("orders").await.unwrap(), 2);
        assert_eq!(store.count_cached_rows("customers").await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rows_without_id_are_rejected() {
        let store = open_memory().await;

        let error = store
            .put_cached_rows(
                "orders",
                &[row(json!({"id": "o1"})), row(json!({"amount": 5}))],
                "id",
            )
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert_eq!(store.count_cached_rows("orders").await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_collections_independently() {
        let store = open_memory().await;
        store
            .put_cached_rows("orders", &[row(json!({"id": "o1"}))], "id")
            .await
            .unwrap();
        let change = PendingChange::new(Operation::Delete, "orders", row(json!({"id": "o1"})), None);
        store.put_pending_change(&change).await.unwrap();

        assert_eq!(store.clear(StoreCollection::PendingChanges).await.unwrap(), 1);
        assert_eq!(store.count_cached_rows("orders").await.unwrap(), 1);

        store.put_pending_change(&change).await.unwrap();
        store.clear_all().await.unwrap();
        assert_eq!(store.count_cached_rows("orders").await.unwrap(), 0);
        assert_eq!(store.count_pending_changes(false).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_collection_names_are_trimmed_on_every_path() {
        let store = open_memory().await;
        store
            .put_cached_rows(
                "orders ",
                &[row(json!({"id": "o1"})), row(json!({"id": "o2"}))],
                "id",
            )
            .await
            .unwrap();

        assert_eq!(store.cached_rows(" orders").await.unwrap().len(), 2);
        assert_eq!(store.count_cached_rows("orders ").await.unwrap(), 2);
        assert!(store.delete_cached_row(" orders ", "o2").await.unwrap());
        assert_eq!(store.clear_cached_collection("orders\t").await.unwrap(), 1);
        assert_eq!(store.count_cached_rows("orders").await.unwrap(), 0);

        let error = store.cached_rows("  ").await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_storage_estimate_passthrough() {
        let store = open_memory().await;
        let estimate = store.storage_estimate().await.unwrap();
        assert!(estimate.used_bytes > 0);
    }
}
