//! Cached row model

use serde::{Deserialize, Serialize};

use super::row::Row;

/// Read-only local copy of a remote row, used to serve reads while offline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRow {
    /// Owning table/collection
    pub collection: String,
    /// Row identifier within the collection
    pub row_id: String,
    /// Full row data
    pub data: Row,
    /// When the row was cached (Unix ms)
    pub cached_at: i64,
}
