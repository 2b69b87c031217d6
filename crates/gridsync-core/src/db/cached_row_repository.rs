//! Cached row repository implementation

use crate::error::{Error, Result};
use crate::models::{CachedRow, Row};
use libsql::{Connection, Value};

/// Trait for cached row storage operations (async)
#[allow(async_fn_in_trait)]
pub trait CachedRowRepository {
    /// Insert or overwrite rows, keyed by collection and row id
    async fn put_many(&self, rows: &[CachedRow]) -> Result<()>;

    /// List all cached rows of a collection
    async fn list_by_collection(&self, collection: &str) -> Result<Vec<CachedRow>>;

    /// Delete one cached row, returning whether it existed
    async fn delete(&self, collection: &str, row_id: &str) -> Result<bool>;

    /// Count cached rows of a collection
    async fn count_by_collection(&self, collection: &str) -> Result<usize>;

    /// Delete all cached rows of a collection
    async fn clear_collection(&self, collection: &str) -> Result<usize>;

    /// Delete every cached row
    async fn clear(&self) -> Result<usize>;
}

/// libSQL implementation of `CachedRowRepository`
pub struct LibSqlCachedRowRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCachedRowRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_row(row: &libsql::Row) -> Result<CachedRow> {
        let data: String = row.get(2)?;
        Ok(CachedRow {
            collection: row.get(0)?,
            row_id: row.get(1)?,
            data: serde_json::from_str::<Row>(&data)?,
            cached_at: row.get(3)?,
        })
    }

    async fn put_one(&self, row: &CachedRow) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO cached_rows (collection, row_id, data, cached_at)
                 VALUES (?, ?, ?, ?)",
                vec![
                    Value::Text(row.collection.clone()),
                    Value::Text(row.row_id.clone()),
                    Value::Text(serde_json::to_string(&row.data)?),
                    Value::Integer(row.cached_at),
                ],
            )
            .await?;
        Ok(())
    }
}

impl CachedRowRepository for LibSqlCachedRowRepository<'_> {
    async fn put_many(&self, rows: &[CachedRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        for row in rows {
            if let Err(error) = self.put_one(row).await {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(error);
            }
        }
        if let Err(error) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(Error::from(error));
        }

        Ok(())
    }

    async fn list_by_collection(&self, collection: &str) -> Result<Vec<CachedRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT collection, row_id, data, cached_at
                 FROM cached_rows
                 WHERE collection = ?
                 ORDER BY row_id ASC",
                [collection],
            )
            .await?;

        let mut cached = Vec::new();
        while let Some(row) = rows.next().await? {
            cached.push(Self::parse_row(&row)?);
        }
        Ok(cached)
    }

    async fn delete(&self, collection: &str, row_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM cached_rows WHERE collection = ? AND row_id = ?",
                [collection, row_id],
            )
            .await?;
        Ok(deleted > 0)
    }

    async fn count_by_collection(&self, collection: &str) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM cached_rows WHERE collection = ?",
                [collection],
            )
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn clear_collection(&self, collection: &str) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM cached_rows WHERE collection = ?", [collection])
            .await?;
        Ok(usize::try_from(deleted).unwrap_or_default())
    }

    async fn clear(&self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM cached_rows", ()).await?;
        Ok(usize::try_from(deleted).unwrap_or_default())
    }
}
