//! Pending change model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::row::{row_id, Row};

/// A unique identifier for a pending change, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PendingChangeId(Uuid);

impl PendingChangeId {
    /// Create a new unique change ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for PendingChangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PendingChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PendingChangeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The kind of mutation a pending change replays against the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Create a new row
    Insert,
    /// Modify an existing row
    Update,
    /// Remove a row
    Delete,
}

impl Operation {
    /// Storage label for this operation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("unknown operation '{other}'"))),
        }
    }
}

/// A local mutation that has not yet been confirmed by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Unique identifier, assigned at creation
    pub id: PendingChangeId,
    /// Mutation kind
    pub operation: Operation,
    /// Target table/collection name
    pub collection: String,
    /// Row to insert, fields to update, or the identifying key for a delete
    pub payload: Row,
    /// Row state captured before the change was recorded
    pub prior_payload: Option<Row>,
    /// Creation timestamp (Unix ms), the queue order key
    pub created_at: i64,
    /// Set once the remote store confirmed the change
    pub synced: bool,
    /// Number of failed replay attempts
    pub attempts: u32,
    /// Timestamp of the last failed attempt (Unix ms)
    pub last_attempt_at: Option<i64>,
    /// Reason recorded for the last failed attempt
    pub last_error: Option<String>,
}

impl PendingChange {
    /// Create a new unsynced change stamped with the current time
    #[must_use]
    pub fn new(
        operation: Operation,
        collection: impl Into<String>,
        payload: Row,
        prior_payload: Option<Row>,
    ) -> Self {
        Self {
            id: PendingChangeId::new(),
            operation,
            collection: collection.into(),
            payload,
            prior_payload,
            created_at: chrono::Utc::now().timestamp_millis(),
            synced: false,
            attempts: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }

    /// Identifier of the target row, read from `payload`
    #[must_use]
    pub fn row_id(&self, id_field: &str) -> Option<String> {
        row_id(&self.payload, id_field)
    }
}

/// Sort changes into replay order by `created_at`.
///
/// The sort is stable: changes stamped in the same millisecond keep the order
/// the store returned them in, which is insertion order.
pub fn sort_for_replay(changes: &mut [PendingChange]) {
    changes.sort_by_key(|change| change.created_at);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_change_id_unique() {
        let id1 = PendingChangeId::new();
        let id2 = PendingChangeId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_change_id_parse() {
        let id = PendingChangeId::new();
        let parsed: PendingChangeId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("insert".parse::<Operation>().unwrap(), Operation::Insert);
        assert_eq!(" UPDATE ".parse::<Operation>().unwrap(), Operation::Update);
        assert_eq!("delete".parse::<Operation>().unwrap(), Operation::Delete);
        assert!("upsert".parse::<Operation>().is_err());
    }

    #[test]
    fn test_new_change_is_unsynced() {
        let change = PendingChange::new(
            Operation::Insert,
            "orders",
            row(json!({"id": "o1", "amount": 10})),
            None,
        );
        assert!(!change.synced);
        assert_eq!(change.attempts, 0);
        assert!(change.created_at > 0);
        assert_eq!(change.row_id("id").as_deref(), Some("o1"));
    }

    #[test]
    fn test_sort_for_replay_orders_by_created_at() {
        let mut first = PendingChange::new(Operation::Insert, "t", Row::new(), None);
        let mut second = PendingChange::new(Operation::Insert, "t", Row::new(), None);
        first.created_at = 200;
        second.created_at = 100;

        let mut changes = vec![first.clone(), second.clone()];
        sort_for_replay(&mut changes);
        assert_eq!(changes[0].id, second.id);
        assert_eq!(changes[1].id, first.id);
    }

    #[test]
    fn test_sort_for_replay_keeps_ties_in_place() {
        let mut a = PendingChange::new(Operation::Update, "t", Row::new(), None);
        let mut b = PendingChange::new(Operation::Update, "t", Row::new(), None);
        let mut c = PendingChange::new(Operation::Update, "t", Row::new(), None);
        a.created_at = 5;
        b.created_at = 5;
        c.created_at = 1;

        let mut changes = vec![b.clone(), a.clone(), c.clone()];
        sort_for_replay(&mut changes);
        let ids: Vec<_> = changes.iter().map(|change| change.id).collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
    }
}
