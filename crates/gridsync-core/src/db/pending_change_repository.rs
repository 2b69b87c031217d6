//! Pending change repository implementation

use crate::error::{Error, Result};
use crate::models::{Operation, PendingChange, PendingChangeId, Row};
use libsql::{Connection, Value};

/// Trait for pending change storage operations (async)
#[allow(async_fn_in_trait)]
pub trait PendingChangeRepository {
    /// Insert or replace a change by id
    async fn put(&self, change: &PendingChange) -> Result<()>;

    /// Get a change by id
    async fn get(&self, id: &PendingChangeId) -> Result<Option<PendingChange>>;

    /// List changes with the given synced flag, oldest first
    async fn list_by_synced(&self, synced: bool) -> Result<Vec<PendingChange>>;

    /// Delete a change, returning whether it existed
    async fn delete(&self, id: &PendingChangeId) -> Result<bool>;

    /// Count changes with the given synced flag
    async fn count_by_synced(&self, synced: bool) -> Result<usize>;

    /// Delete every change, returning how many were removed
    async fn clear(&self) -> Result<usize>;
}

/// libSQL implementation of `PendingChangeRepository`
pub struct LibSqlPendingChangeRepository<'a> {
    conn: &'a Connection,
}

const SELECT_COLUMNS: &str = "SELECT id, operation, collection, payload, prior_payload, created_at, synced, attempts, last_attempt_at, last_error FROM pending_changes";

impl<'a> LibSqlPendingChangeRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a change from a database row
    fn parse_change(row: &libsql::Row) -> Result<PendingChange> {
        let id: String = row.get(0)?;
        let operation: String = row.get(1)?;
        let payload: String = row.get(3)?;
        let prior_payload = optional_text(row, 4)?;

        Ok(PendingChange {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid pending change id '{id}'")))?,
            operation: operation.parse::<Operation>()?,
            collection: row.get(2)?,
            payload: serde_json::from_str::<Row>(&payload)?,
            prior_payload: prior_payload
                .map(|text| serde_json::from_str::<Row>(&text))
                .transpose()?,
            created_at: row.get(5)?,
            synced: row.get::<i32>(6)? != 0,
            attempts: u32::try_from(row.get::<i64>(7)?).unwrap_or(u32::MAX),
            last_attempt_at: optional_integer(row, 8)?,
            last_error: optional_text(row, 9)?,
        })
    }

    async fn collect(&self, mut rows: libsql::Rows) -> Result<Vec<PendingChange>> {
        let mut changes = Vec::new();
        while let Some(row) = rows.next().await? {
            changes.push(Self::parse_change(&row)?);
        }
        Ok(changes)
    }
}

impl PendingChangeRepository for LibSqlPendingChangeRepository<'_> {
    async fn put(&self, change: &PendingChange) -> Result<()> {
        let payload = serde_json::to_string(&change.payload)?;
        let prior_payload = change
            .prior_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // Upsert keeps `seq`, so replay order survives in-place updates
        self.conn
            .execute(
                "INSERT INTO pending_changes (
                    id, operation, collection, payload, prior_payload,
                    created_at, synced, attempts, last_attempt_at, last_error
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    operation = excluded.operation,
                    collection = excluded.collection,
                    payload = excluded.payload,
                    prior_payload = excluded.prior_payload,
                    created_at = excluded.created_at,
                    synced = excluded.synced,
                    attempts = excluded.attempts,
                    last_attempt_at = excluded.last_attempt_at,
                    last_error = excluded.last_error",
                vec![
                    Value::Text(change.id.as_str()),
                    Value::Text(change.operation.as_str().to_string()),
                    Value::Text(change.collection.clone()),
                    Value::Text(payload),
                    text_or_null(prior_payload),
                    Value::Integer(change.created_at),
                    Value::Integer(i64::from(change.synced)),
                    Value::Integer(i64::from(change.attempts)),
                    change.last_attempt_at.map_or(Value::Null, Value::Integer),
                    text_or_null(change.last_error.clone()),
                ],
            )
            .await?;

        Ok(())
    }

    async fn get(&self, id: &PendingChangeId) -> Result<Option<PendingChange>> {
        let mut rows = self
            .conn
            .query(&format!("{SELECT_COLUMNS} WHERE id = ?"), [id.as_str()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_change(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_by_synced(&self, synced: bool) -> Result<Vec<PendingChange>> {
        let rows = self
            .conn
            .query(
                &format!("{SELECT_COLUMNS} WHERE synced = ? ORDER BY created_at ASC, seq ASC"),
                [i64::from(synced)],
            )
            .await?;

        self.collect(rows).await
    }

    async fn delete(&self, id: &PendingChangeId) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM pending_changes WHERE id = ?", [id.as_str()])
            .await?;
        Ok(deleted > 0)
    }

    async fn count_by_synced(&self, synced: bool) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM pending_changes WHERE synced = ?",
                [i64::from(synced)],
            )
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn clear(&self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM pending_changes", ()).await?;
        Ok(usize::try_from(deleted).unwrap_or_default())
    }
}

pub(super) fn text_or_null(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::Text)
}

pub(super) fn optional_text(row: &libsql::Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(Error::Database(format!(
            "expected text in column {idx}, found {other:?}"
        ))),
    }
}

fn optional_integer(row: &libsql::Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Integer(value) => Ok(Some(value)),
        other => Err(Error::Database(format!(
            "expected integer in column {idx}, found {other:?}"
        ))),
    }
}
