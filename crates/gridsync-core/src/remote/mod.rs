//! Remote system of record
//!
//! The sync engine only needs the five operations of [`RemoteStore`]. The HTTP
//! implementation talks to a PostgREST-style endpoint; the in-memory one backs
//! tests and local demos.

mod memory;
mod rest;

use thiserror::Error;

use crate::models::Row;

pub use memory::{MemoryRemoteStore, RemoteCall, RemoteOperation, RemotePause};
pub use rest::RestRemoteStore;

/// Failure reported at the remote store boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The target row does not exist remotely
    #[error("Row not found")]
    NotFound,

    /// The remote row changed after the local change's baseline
    #[error("Conflict: remote version is newer")]
    Conflict,

    /// Transport failure; the request may never have reached the server
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with an error status
    #[error("Remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    /// Whether the same request may succeed later without intervention.
    ///
    /// Transport failures, timeouts, rate limiting and server errors are
    /// retryable. Conflicts, missing rows and other client errors are not.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Other(_) => true,
            Self::Rejected { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            Self::NotFound | Self::Conflict => false,
        }
    }
}

/// Result type for remote operations
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Capability for applying changes to the system of record
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a row
    async fn insert(&self, collection: &str, payload: &Row) -> RemoteResult<()>;

    /// Apply `payload` to the row identified by `id`
    async fn update(&self, collection: &str, id: &str, payload: &Row) -> RemoteResult<()>;

    /// Remove the row identified by `id`
    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()>;

    /// Read the current state of one row
    async fn fetch(&self, collection: &str, id: &str) -> RemoteResult<Row>;

    /// Read every row of a collection
    async fn fetch_all(&self, collection: &str) -> RemoteResult<Vec<Row>>;
}
