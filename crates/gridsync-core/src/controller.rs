//! Connectivity controller
//!
//! Owns the runtime state of the offline layer: connectivity, the drain flag,
//! the last sync time and the pending count mirrored from the queue. Drains
//! start on reconnect, on request, shortly after a change is recorded while
//! online, and with backoff after drains that left retryable failures.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::config::SyncConfig;
use crate::connectivity::{Connectivity, ConnectivitySignal, Subscription};
use crate::error::Result;
use crate::models::{
    Operation, PendingChange, PendingChangeId, Row, StorageEstimate, SyncOutcome, SyncStatus,
};
use crate::queue::PendingQueue;
use crate::remote::RemoteStore;
use crate::store::{LocalStore, StoreCollection};
use crate::sync::SyncEngine;

type SyncFuture = Pin<Box<dyn Future<Output = SyncOutcome> + Send>>;

/// Subscriptions created by [`ConnectivityController::attach`]
#[derive(Debug)]
#[must_use = "dropping the binding detaches the controller from the signal"]
pub struct ConnectivityBinding {
    pub online: Subscription,
    pub offline: Subscription,
}

impl ConnectivityBinding {
    /// Detach both handlers now
    pub fn unsubscribe(self) {
        self.online.unsubscribe();
        self.offline.unsubscribe();
    }

    /// Keep both handlers attached for the lifetime of the signal
    pub fn persist(self) {
        self.online.persist();
        self.offline.persist();
    }
}

struct Inner {
    store: Arc<LocalStore>,
    queue: PendingQueue,
    engine: SyncEngine,
    config: SyncConfig,
    status: watch::Sender<SyncStatus>,
    runtime: Handle,
    retry_attempt: AtomicU32,
    enqueue_generation: AtomicU64,
}

/// Entry point for reads, writes and sync scheduling while offline-capable
#[derive(Clone)]
pub struct ConnectivityController {
    inner: Arc<Inner>,
}

impl ConnectivityController {
    /// Create a controller and initialize the local store.
    ///
    /// Initialization failures are logged; the controller stays usable and
    /// later operations retry initialization. Must run inside a Tokio runtime.
    pub async fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        initial: Connectivity,
        config: SyncConfig,
    ) -> Self {
        let queue = PendingQueue::new(Arc::clone(&store));
        let engine = SyncEngine::new(queue.clone(), remote, &config);
        let (status, _) = watch::channel(SyncStatus {
            is_online: initial.is_online(),
            ..SyncStatus::default()
        });

        let controller = Self {
            inner: Arc::new(Inner {
                store,
                queue,
                engine,
                config,
                status,
                runtime: Handle::current(),
                retry_attempt: AtomicU32::new(0),
                enqueue_generation: AtomicU64::new(0),
            }),
        };
        controller.initialize().await;
        controller
    }

    async fn initialize(&self) {
        if let Err(error) = self.inner.store.init().await {
            tracing::error!(
                "Offline storage unavailable, continuing without it: {}",
                error
            );
            return;
        }
        self.update_status(|status| status.is_ready = true);

        match self.inner.queue.count_unsynced().await {
            Ok(count) => self.update_status(|status| status.pending_count = count),
            Err(error) => tracing::error!("Failed to count pending changes: {}", error),
        }
    }

    /// Current status snapshot
    pub fn status(&self) -> SyncStatus {
        *self.inner.status.borrow()
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    /// Whether the controller currently considers the network reachable
    pub fn is_online(&self) -> bool {
        self.status().is_online
    }

    /// The local store backing this controller
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.inner.store
    }

    /// The sync engine driven by this controller
    pub fn engine(&self) -> &SyncEngine {
        &self.inner.engine
    }

    /// Call `handler` with the outcome of every drain that runs
    pub fn on_sync_complete(
        &self,
        handler: impl Fn(&SyncOutcome) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.engine.on_sync_complete(handler)
    }

    fn update_status(&self, update: impl FnOnce(&mut SyncStatus)) {
        self.inner.status.send_modify(update);
    }

    // Connectivity

    /// Apply a connectivity report. Reports of the current state are ignored.
    ///
    /// Going online starts a drain in the background; going offline only
    /// records the state and lets an in-flight drain finish.
    pub fn set_connectivity(&self, state: Connectivity) {
        let online = state.is_online();
        let changed = self.inner.status.send_if_modified(|status| {
            let changed = status.is_online != online;
            status.is_online = online;
            changed
        });
        if !changed {
            return;
        }

        tracing::info!("Controller is now {}", state);
        if online {
            self.inner.retry_attempt.store(0, Ordering::Relaxed);
            self.spawn_sync();
        }
    }

    /// Connectivity-restored event
    pub fn handle_online(&self) {
        self.set_connectivity(Connectivity::Online);
    }

    /// Connectivity-lost event
    pub fn handle_offline(&self) {
        self.set_connectivity(Connectivity::Offline);
    }

    /// Follow `signal`, starting from its current state
    pub fn attach(&self, signal: &ConnectivitySignal) -> ConnectivityBinding {
        let online = signal.on_online({
            let controller = self.clone();
            move || controller.handle_online()
        });
        let offline = signal.on_offline({
            let controller = self.clone();
            move || controller.handle_offline()
        });
        self.set_connectivity(signal.current());
        ConnectivityBinding { online, offline }
    }

    // Syncing

    /// Drain the queue now.
    ///
    /// Returns [`SyncOutcome::skipped`] without doing any work when offline or
    /// when a drain is already running.
    pub async fn request_sync(&self) -> SyncOutcome {
        if !self.is_online() {
            tracing::debug!("Sync requested while offline");
            return SyncOutcome::skipped();
        }
        if let Err(error) = self.ready_store().await {
            tracing::error!("Sync aborted, offline storage unavailable: {}", error);
            let outcome = SyncOutcome::storage_failure(error.to_string());
            self.schedule_retry(&outcome);
            return outcome;
        }
        let engine = &self.inner.engine;
        let Some(guard) = engine.try_begin() else {
            tracing::debug!("Sync requested while a drain is running");
            return SyncOutcome::skipped();
        };

        self.update_status(|status| status.is_syncing = true);
        let outcome = engine.run(&guard).await;
        let last_sync_time = engine.last_sync_time();
        self.update_status(|status| {
            status.is_syncing = false;
            status.last_sync_time = last_sync_time;
        });
        drop(guard);

        self.refresh_pending_count().await;
        self.schedule_retry(&outcome);
        outcome
    }

    fn sync_boxed(self) -> SyncFuture {
        Box::pin(async move { self.request_sync().await })
    }

    fn spawn_sync(&self) {
        self.inner.runtime.spawn(self.clone().sync_boxed());
    }

    fn schedule_retry(&self, outcome: &SyncOutcome) {
        let Some(policy) = self.inner.config.retry else {
            return;
        };
        if !outcome.has_retryable_failures() {
            self.inner.retry_attempt.store(0, Ordering::Relaxed);
            return;
        }

        let attempt = self.inner.retry_attempt.fetch_add(1, Ordering::Relaxed);
        let Some(delay) = policy.delay_for(attempt) else {
            tracing::warn!(
                "Giving up automatic retries after {} attempts; {} changes still pending",
                attempt,
                self.status().pending_count
            );
            return;
        };

        tracing::debug!("Retrying sync in {:?} (attempt {})", delay, attempt + 1);
        let retry = self.clone().sync_boxed();
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            retry.await;
        });
    }

    fn schedule_enqueue_sync(&self) {
        let Some(delay) = self.inner.config.enqueue_sync_delay else {
            return;
        };
        if !self.is_online() {
            return;
        }

        // Only the most recent change in a burst triggers the drain
        let generation = self.inner.enqueue_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let controller = self.clone();
        let sync = self.clone().sync_boxed();
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if controller.inner.enqueue_generation.load(Ordering::Acquire) == generation {
                sync.await;
            }
        });
    }

    async fn refresh_pending_count(&self) {
        match self.inner.queue.count_unsynced().await {
            Ok(count) => self.update_status(|status| status.pending_count = count),
            Err(error) => tracing::warn!("Failed to refresh pending count: {}", error),
        }
    }

    async fn ready_store(&self) -> Result<&LocalStore> {
        self.inner.store.init().await?;
        if !self.status().is_ready {
            self.update_status(|status| status.is_ready = true);
        }
        Ok(&self.inner.store)
    }

    // Writes and reads

    /// Queue a local mutation. Works regardless of connectivity.
    pub async fn record_pending_change(
        &self,
        operation: Operation,
        collection: &str,
        payload: Row,
        prior_payload: Option<Row>,
    ) -> Result<PendingChangeId> {
        self.ready_store().await?;
        let id = self
            .inner
            .queue
            .enqueue(operation, collection, payload, prior_payload)
            .await?;
        self.refresh_pending_count().await;
        self.schedule_enqueue_sync();
        Ok(id)
    }

    /// Unsynced changes in replay order
    pub async fn list_pending(&self) -> Result<Vec<PendingChange>> {
        self.ready_store().await?;
        self.inner.queue.list_unsynced().await
    }

    /// Store rows for offline reads
    pub async fn cache_rows(&self, collection: &str, rows: &[Row]) -> Result<()> {
        self.ready_store()
            .await?
            .put_cached_rows(collection, rows, &self.inner.config.id_field)
            .await
    }

    /// Rows cached for a collection
    pub async fn read_cached_rows(&self, collection: &str) -> Result<Vec<Row>> {
        let cached = self.ready_store().await?.cached_rows(collection).await?;
        Ok(cached.into_iter().map(|cached| cached.data).collect())
    }

    /// Fetch every row of a collection from the remote store and cache it
    pub async fn refresh_cached_rows(&self, collection: &str) -> Result<usize> {
        let rows = self.inner.engine.remote().fetch_all(collection).await?;
        self.cache_rows(collection, &rows).await?;
        Ok(rows.len())
    }

    /// Drop the cached rows of one collection
    pub async fn clear_cached_rows(&self, collection: &str) -> Result<usize> {
        self.ready_store()
            .await?
            .clear_cached_collection(collection)
            .await
    }

    /// Wipe cached rows and the pending queue.
    ///
    /// Unsynced changes are lost; callers must confirm with the user first.
    pub async fn clear_all(&self) -> Result<()> {
        let store = self.ready_store().await?;
        store.clear(StoreCollection::CachedRows).await?;
        store.clear(StoreCollection::PendingChanges).await?;
        self.update_status(|status| status.pending_count = 0);
        tracing::info!("Cleared all offline data");
        Ok(())
    }

    /// Storage usage reported by the local store
    pub async fn storage_estimate(&self) -> Result<StorageEstimate> {
        self.ready_store().await?.storage_estimate().await
    }
}
