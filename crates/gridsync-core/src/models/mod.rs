//! Data models for gridsync

mod cached_row;
mod outcome;
mod pending_change;
mod row;
mod status;

pub use cached_row::CachedRow;
pub use outcome::{SyncFailure, SyncOutcome};
pub use pending_change::{sort_for_replay, Operation, PendingChange, PendingChangeId};
pub use row::{into_row, is_remote_newer, modified_marker, row_id, Row};
pub use status::{StorageEstimate, SyncStatus};
