//! Status surface exposed to UI and data-access code

use serde::{Deserialize, Serialize};

/// Snapshot of the connectivity controller's state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Current connectivity
    pub is_online: bool,
    /// Local store initialized and usable
    pub is_ready: bool,
    /// Unsynced changes in the queue, mirrored from the store
    pub pending_count: usize,
    /// A drain is in progress
    pub is_syncing: bool,
    /// Completion time of the last drain that ran (Unix ms)
    pub last_sync_time: Option<i64>,
}

/// Storage usage reported by the local store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEstimate {
    /// Bytes currently used
    pub used_bytes: u64,
    /// Upper bound the backend will grow to, when known
    pub quota_bytes: Option<u64>,
}

impl StorageEstimate {
    /// Used bytes as a percentage of the quota
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn usage_percent(&self) -> Option<f64> {
        let quota = self.quota_bytes.filter(|quota| *quota > 0)?;
        Some(self.used_bytes as f64 / quota as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_percent_needs_quota() {
        let unknown = StorageEstimate {
            used_bytes: 10,
            quota_bytes: None,
        };
        assert_eq!(unknown.usage_percent(), None);

        let half = StorageEstimate {
            used_bytes: 50,
            quota_bytes: Some(100),
        };
        assert_eq!(half.usage_percent(), Some(50.0));
    }
}
