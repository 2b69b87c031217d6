//! Sync engine
//!
//! Drains the pending change queue against a [`RemoteStore`]. Changes are
//! replayed strictly in creation order, one at a time. A failing change is
//! recorded and left queued; the drain moves on to the next one.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::listeners::{Listeners, Subscription};
use crate::models::{is_remote_newer, Operation, PendingChange, SyncOutcome};
use crate::queue::PendingQueue;
use crate::remote::{RemoteError, RemoteStore};
use crate::util::unix_timestamp_millis;

/// Marks a drain in progress; released on drop
#[derive(Debug)]
pub struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    /// Claim the flag, or `None` if a drain already holds it
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Replays queued changes against the remote store
pub struct SyncEngine {
    queue: PendingQueue,
    remote: Arc<dyn RemoteStore>,
    id_field: String,
    modified_field: String,
    syncing: AtomicBool,
    // 0 until the first drain completes
    last_sync_time: AtomicI64,
    completed: Listeners<SyncOutcome>,
}

impl SyncEngine {
    /// Create an engine draining `queue` into `remote`
    pub fn new(queue: PendingQueue, remote: Arc<dyn RemoteStore>, config: &SyncConfig) -> Self {
        Self {
            queue,
            remote,
            id_field: config.id_field.clone(),
            modified_field: config.modified_field.clone(),
            syncing: AtomicBool::new(false),
            last_sync_time: AtomicI64::new(0),
            completed: Listeners::new(),
        }
    }

    /// The queue being drained
    pub const fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// The remote store changes are replayed against
    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Whether a drain is in progress
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Completion time of the last drain that ran (Unix ms)
    pub fn last_sync_time(&self) -> Option<i64> {
        match self.last_sync_time.load(Ordering::Acquire) {
            0 => None,
            time => Some(time),
        }
    }

    /// Call `handler` with the outcome of every drain that runs
    pub fn on_sync_complete(
        &self,
        handler: impl Fn(&SyncOutcome) + Send + Sync + 'static,
    ) -> Subscription {
        self.completed.subscribe(handler)
    }

    /// Claim the drain flag without draining yet
    pub fn try_begin(&self) -> Option<DrainGuard<'_>> {
        DrainGuard::acquire(&self.syncing)
    }

    /// Drain the queue unless offline or already draining.
    ///
    /// A skipped drain returns [`SyncOutcome::skipped`] and makes no remote
    /// calls.
    pub async fn sync_all(&self, online: bool) -> SyncOutcome {
        if !online {
            tracing::debug!("Skipping sync while offline");
            return SyncOutcome::skipped();
        }
        let Some(guard) = self.try_begin() else {
            tracing::debug!("Skipping sync, a drain is already in progress");
            return SyncOutcome::skipped();
        };
        self.run(&guard).await
    }

    /// Drain the queue. The caller keeps `_guard` until it is done with the
    /// outcome.
    pub async fn run(&self, _guard: &DrainGuard<'_>) -> SyncOutcome {
        let outcome = match self.queue.list_unsynced().await {
            Ok(changes) => {
                let outcome = self.drain(changes).await;
                self.last_sync_time
                    .store(unix_timestamp_millis(), Ordering::Release);
                outcome
            }
            Err(error) => {
                tracing::error!("Sync aborted, failed to read pending changes: {}", error);
                SyncOutcome::storage_failure(error.to_string())
            }
        };

        self.completed.emit(&outcome);
        outcome
    }

    async fn drain(&self, changes: Vec<PendingChange>) -> SyncOutcome {
        if changes.is_empty() {
            return SyncOutcome::empty();
        }

        tracing::info!("Syncing {} pending changes", changes.len());
        let mut outcome = SyncOutcome::default();

        for change in &changes {
            match self.apply(change).await {
                Ok(()) => match self.confirm(change).await {
                    Ok(()) => outcome.record_synced(),
                    Err(error) => {
                        tracing::error!(
                            "Change {} applied remotely but could not be confirmed locally: {}",
                            change.id,
                            error
                        );
                        outcome.record_failure(change.id, error.to_string(), error.is_retryable());
                    }
                },
                Err(error) => {
                    let reason = error.to_string();
                    tracing::warn!(
                        "Failed to sync {} on {} ({}): {}",
                        change.operation,
                        change.collection,
                        change.id,
                        reason
                    );
                    if let Err(store_error) = self.queue.record_failure(&change.id, &reason).await {
                        tracing::warn!(
                            "Failed to record sync failure for {}: {}",
                            change.id,
                            store_error
                        );
                    }
                    outcome.record_failure(change.id, reason, error.is_retryable());
                }
            }
        }

        let outcome = outcome.finish();
        tracing::info!(
            "Sync finished: {} synced, {} failed",
            outcome.synced_count,
            outcome.failed_count
        );
        outcome
    }

    /// Two explicit steps, so the confirmed-but-queued state is observable
    async fn confirm(&self, change: &PendingChange) -> Result<()> {
        self.queue.mark_synced(&change.id).await?;
        self.queue.remove(&change.id).await?;
        Ok(())
    }

    async fn apply(&self, change: &PendingChange) -> Result<()> {
        let collection = change.collection.as_str();
        match change.operation {
            Operation::Insert => {
                self.remote.insert(collection, &change.payload).await?;
            }
            Operation::Update => {
                let id = self.target_id(change)?;
                if let Some(prior) = &change.prior_payload {
                    match self.remote.fetch(collection, &id).await {
                        Ok(current) => {
                            if is_remote_newer(&current, prior, &self.modified_field) {
                                tracing::warn!(
                                    "Conflict on {}/{}: remote row changed since change {} was recorded",
                                    collection,
                                    id,
                                    change.id
                                );
                                return Err(RemoteError::Conflict.into());
                            }
                        }
                        Err(RemoteError::NotFound) => return self.reinsert(change, &id).await,
                        Err(error) => return Err(error.into()),
                    }
                }
                match self.remote.update(collection, &id, &change.payload).await {
                    Ok(()) => {}
                    Err(RemoteError::NotFound) => return self.reinsert(change, &id).await,
                    Err(error) => return Err(error.into()),
                }
            }
            Operation::Delete => {
                let id = self.target_id(change)?;
                match self.remote.delete(collection, &id).await {
                    Ok(()) => {}
                    Err(RemoteError::NotFound) => {
                        tracing::debug!("{}/{} already absent remotely", collection, id);
                    }
                    Err(error) => return Err(error.into()),
                }
            }
        }
        Ok(())
    }

    async fn reinsert(&self, change: &PendingChange, id: &str) -> Result<()> {
        tracing::info!(
            "{}/{} missing remotely, re-inserting for change {}",
            change.collection,
            id,
            change.id
        );
        self.remote.insert(&change.collection, &change.payload).await?;
        Ok(())
    }

    fn target_id(&self, change: &PendingChange) -> Result<String> {
        change.row_id(&self.id_field).ok_or_else(|| {
            Error::InvalidInput(format!(
                "{} requires '{}' in the payload",
                change.operation, self.id_field
            ))
        })
    }
}
