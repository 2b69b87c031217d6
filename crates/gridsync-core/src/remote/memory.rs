//! In-memory system of record.
//!
//! Keeps rows per collection and journals every call it receives. It can be
//! switched offline, told to fail specific rows, and paused so callers can
//! observe a drain while it is in flight.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock};

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::models::{row_id, Row};

/// Kind of call received by [`MemoryRemoteStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    Insert,
    Update,
    Delete,
    Fetch,
    FetchAll,
}

/// One journaled call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub operation: RemoteOperation,
    pub collection: String,
    pub row_id: Option<String>,
    pub payload: Option<Row>,
}

/// Holds the store's call gate shut until dropped
pub struct RemotePause {
    _guard: OwnedRwLockWriteGuard<()>,
}

type Tables = HashMap<String, BTreeMap<String, Row>>;

/// Remote store keeping rows in memory
pub struct MemoryRemoteStore {
    id_field: String,
    tables: Mutex<Tables>,
    calls: Mutex<Vec<RemoteCall>>,
    failures: Mutex<HashMap<(String, String), RemoteError>>,
    offline: AtomicBool,
    gate: Arc<RwLock<()>>,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    /// Create an empty store keyed by `id`
    pub fn new() -> Self {
        Self::with_id_field("id")
    }

    /// Create an empty store keyed by the given field
    pub fn with_id_field(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            tables: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            gate: Arc::new(RwLock::new(())),
        }
    }

    /// Put rows directly, bypassing the journal
    pub async fn seed(&self, collection: &str, rows: impl IntoIterator<Item = Row>) {
        let mut tables = self.tables.lock().await;
        let table = tables.entry(collection.to_string()).or_default();
        for row in rows {
            if let Some(id) = row_id(&row, &self.id_field) {
                table.insert(id, row);
            }
        }
    }

    /// Current state of one row
    pub async fn row(&self, collection: &str, id: &str) -> Option<Row> {
        self.tables
            .lock()
            .await
            .get(collection)
            .and_then(|table| table.get(id))
            .cloned()
    }

    /// Number of rows in a collection
    pub async fn row_count(&self, collection: &str) -> usize {
        self.tables
            .lock()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Every call received so far, oldest first
    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().await.clone()
    }

    /// Forget the journal
    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    /// Fail every call that touches the given row
    pub async fn fail_row(&self, collection: &str, id: &str, error: RemoteError) {
        self.failures
            .lock()
            .await
            .insert((collection.to_string(), id.to_string()), error);
    }

    /// Stop injecting failures
    pub async fn clear_failures(&self) {
        self.failures.lock().await.clear();
    }

    /// Answer every call with a network error while set
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Block calls after they are journaled until the returned pause is dropped
    pub async fn pause(&self) -> RemotePause {
        RemotePause {
            _guard: Arc::clone(&self.gate).write_owned().await,
        }
    }

    async fn begin(
        &self,
        operation: RemoteOperation,
        collection: &str,
        id: Option<&str>,
        payload: Option<&Row>,
    ) -> RemoteResult<()> {
        self.calls.lock().await.push(RemoteCall {
            operation,
            collection: collection.to_string(),
            row_id: id.map(ToString::to_string),
            payload: payload.cloned(),
        });

        drop(self.gate.read().await);

        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("remote store is offline".to_string()));
        }
        if let Some(id) = id {
            let failures = self.failures.lock().await;
            if let Some(error) = failures.get(&(collection.to_string(), id.to_string())) {
                return Err(error.clone());
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn insert(&self, collection: &str, payload: &Row) -> RemoteResult<()> {
        let id = row_id(payload, &self.id_field);
        self.begin(
            RemoteOperation::Insert,
            collection,
            id.as_deref(),
            Some(payload),
        )
        .await?;

        let id = id.ok_or_else(|| RemoteError::Rejected {
            status: 400,
            message: format!("missing '{}'", self.id_field),
        })?;
        let mut tables = self.tables.lock().await;
        let table = tables.entry(collection.to_string()).or_default();
        if table.contains_key(&id) {
            return Err(RemoteError::Rejected {
                status: 409,
                message: format!("duplicate key {id}"),
            });
        }
        table.insert(id, payload.clone());
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, payload: &Row) -> RemoteResult<()> {
        self.begin(RemoteOperation::Update, collection, Some(id), Some(payload))
            .await?;

        let mut tables = self.tables.lock().await;
        let row = tables
            .get_mut(collection)
            .and_then(|table| table.get_mut(id))
            .ok_or(RemoteError::NotFound)?;
        for (field, value) in payload {
            row.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        self.begin(RemoteOperation::Delete, collection, Some(id), None)
            .await?;

        let mut tables = self.tables.lock().await;
        tables
            .get_mut(collection)
            .and_then(|table| table.remove(id))
            .map(|_| ())
            .ok_or(RemoteError::NotFound)
    }

    async fn fetch(&self, collection: &str, id: &str) -> RemoteResult<Row> {
        self.begin(RemoteOperation::Fetch, collection, Some(id), None)
            .await?;
        self.row(collection, id).await.ok_or(RemoteError::NotFound)
    }

    async fn fetch_all(&self, collection: &str) -> RemoteResult<Vec<Row>> {
        self.begin(RemoteOperation::FetchAll, collection, None, None)
            .await?;
        Ok(self
            .tables
            .lock()
            .await
            .get(collection)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }
}
