//! Database connection management

use crate::error::Result;
use crate::models::StorageEstimate;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Database wrapper for libSQL connections
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self { _db: db, conn };
        database.configure().await?;
        database.migrate().await?;
        tracing::debug!("Opened local store at {}", path.display());
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self { _db: db, conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for durability with reasonable write throughput
    async fn configure(&self) -> Result<()> {
        // journal_mode returns a row and is rejected by in-memory databases
        self.conn.query("PRAGMA journal_mode = WAL;", ()).await.ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Estimate how much space the database occupies
    pub async fn storage_estimate(&self) -> Result<StorageEstimate> {
        let page_size = self.pragma_u64("page_size").await?.unwrap_or(0);
        let page_count = self.pragma_u64("page_count").await?.unwrap_or(0);
        let max_page_count = self.pragma_u64("max_page_count").await?;

        Ok(StorageEstimate {
            used_bytes: page_count.saturating_mul(page_size),
            quota_bytes: max_page_count.map(|pages| pages.saturating_mul(page_size)),
        })
    }

    async fn pragma_u64(&self, name: &str) -> Result<Option<u64>> {
        let mut rows = self.conn.query(&format!("PRAGMA {name}"), ()).await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let value: i64 = row.get(0)?;
        Ok(u64::try_from(value).ok())
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
