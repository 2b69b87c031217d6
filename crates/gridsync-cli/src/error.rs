use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] gridsync_core::Error),
    #[error(transparent)]
    Remote(#[from] gridsync_core::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Collection name cannot be empty")]
    EmptyCollection,
    #[error("Invalid {0}: expected a JSON object")]
    InvalidRow(&'static str),
    #[error(
        "Remote store is not configured. Set GRIDSYNC_REST_URL (and GRIDSYNC_API_KEY / GRIDSYNC_ACCESS_TOKEN as needed)."
    )]
    RemoteNotConfigured,
    #[error("Refusing to delete offline data without --yes")]
    ResetNotConfirmed,
}
