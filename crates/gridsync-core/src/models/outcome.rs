//! Drain outcome model

use serde::{Deserialize, Serialize};

use super::pending_change::PendingChangeId;

/// One change that could not be applied during a drain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    /// The failed change, or `None` when the drain itself could not read the queue
    pub change_id: Option<PendingChangeId>,
    /// Human-readable failure reason
    pub reason: String,
    /// Whether retrying later may succeed without intervention
    pub retryable: bool,
}

/// Aggregated result of one drain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// True iff `failed_count == 0` for a drain that actually ran
    pub success: bool,
    /// Changes confirmed and removed from the queue
    pub synced_count: usize,
    /// Changes left in the queue after failing
    pub failed_count: usize,
    /// Failures in processing order
    pub errors: Vec<SyncFailure>,
}

impl SyncOutcome {
    /// Outcome of a drain that did no work (already draining, or offline)
    #[must_use]
    pub fn skipped() -> Self {
        Self::default()
    }

    /// Outcome of a drain over an empty queue
    #[must_use]
    pub fn empty() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Outcome of a drain that could not read the queue at all
    #[must_use]
    pub fn storage_failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            synced_count: 0,
            failed_count: 0,
            errors: vec![SyncFailure {
                change_id: None,
                reason: reason.into(),
                retryable: true,
            }],
        }
    }

    pub(crate) fn record_synced(&mut self) {
        self.synced_count += 1;
    }

    pub(crate) fn record_failure(
        &mut self,
        change_id: PendingChangeId,
        reason: impl Into<String>,
        retryable: bool,
    ) {
        self.failed_count += 1;
        self.errors.push(SyncFailure {
            change_id: Some(change_id),
            reason: reason.into(),
            retryable,
        });
    }

    pub(crate) fn finish(mut self) -> Self {
        self.success = self.failed_count == 0;
        self
    }

    /// Whether any failure may clear up on a later drain
    #[must_use]
    pub fn has_retryable_failures(&self) -> bool {
        self.errors.iter().any(|failure| failure.retryable)
    }
}
