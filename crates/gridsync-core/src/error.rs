//! Error types for gridsync-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using gridsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gridsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local store not initialized, closed, or its backend could not be opened
    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Remote system of record error
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl Error {
    /// Whether this error means the local store cannot currently be used.
    pub const fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Whether the failed operation may succeed if attempted again later.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(error) => error.is_retryable(),
            Self::Database(_) | Self::LibSql(_) | Self::Io(_) | Self::StorageUnavailable(_) => true,
            Self::NotFound(_) | Self::InvalidInput(_) | Self::Serialization(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_display_unwrapped() {
        let error = Error::from(RemoteError::Conflict);
        assert_eq!(error.to_string(), "Conflict: remote version is newer");
        assert!(!error.is_retryable());
    }

    #[test]
    fn storage_errors_are_retryable() {
        let error = Error::StorageUnavailable("closed".to_string());
        assert!(error.is_storage_unavailable());
        assert!(error.is_retryable());
        assert!(!Error::InvalidInput("missing id".to_string()).is_retryable());
    }
}
