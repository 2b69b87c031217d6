//! Database layer for gridsync

mod cached_row_repository;
mod connection;
mod migrations;
mod pending_change_repository;

pub use cached_row_repository::{CachedRowRepository, LibSqlCachedRowRepository};
pub use connection::Database;
pub use pending_change_repository::{LibSqlPendingChangeRepository, PendingChangeRepository};
