//! Runtime configuration for the local store, sync engine, and remote store.
//!
//! `SyncConfig` tunes drain scheduling and row field names, `RemoteConfig`
//! points the HTTP remote at a PostgREST-style endpoint, and `StoreLocation`
//! selects where the local store lives.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::util::{is_http_url, non_blank};

/// Base URL of the REST endpoint serving the system of record
pub const ENV_REST_URL: &str = "GRIDSYNC_REST_URL";
/// API key sent as the `apikey` header
pub const ENV_API_KEY: &str = "GRIDSYNC_API_KEY";
/// Bearer token sent as the `Authorization` header
pub const ENV_ACCESS_TOKEN: &str = "GRIDSYNC_ACCESS_TOKEN";
/// Local store file path
pub const ENV_DB_PATH: &str = "GRIDSYNC_DB_PATH";
/// URL polled by the reachability probe
pub const ENV_PROBE_URL: &str = "GRIDSYNC_PROBE_URL";

const DEFAULT_ENQUEUE_SYNC_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(15);

/// Where the durable local store keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A database file, created on first use
    Path(PathBuf),
    /// A private in-memory database (tests, demos)
    InMemory,
}

impl StoreLocation {
    /// Build a file location
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::InMemory => f.write_str(":memory:"),
        }
    }
}

/// Exponential backoff for follow-up drains after retryable failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first follow-up drain
    pub initial_delay: Duration,
    /// Factor applied to the delay after each attempt
    pub multiplier: u32,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Follow-up drains attempted before giving up until the next trigger
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before follow-up attempt `attempt` (zero-based), or `None` once
    /// attempts are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.max(1).saturating_pow(attempt);
        Some(
            self.initial_delay
                .saturating_mul(factor)
                .min(self.max_delay),
        )
    }
}

/// Drain scheduling and row field configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Drain this long after a change is recorded while online
    pub enqueue_sync_delay: Option<Duration>,
    /// Automatic follow-up drains after retryable failures
    pub retry: Option<RetryPolicy>,
    /// Row field holding the primary key
    pub id_field: String,
    /// Row field holding the last-modified marker
    pub modified_field: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncConfig {
    /// Create a configuration with the default schedule and field names
    pub fn new() -> Self {
        Self {
            enqueue_sync_delay: Some(DEFAULT_ENQUEUE_SYNC_DELAY),
            retry: Some(RetryPolicy::default()),
            id_field: "id".to_string(),
            modified_field: "updated_at".to_string(),
        }
    }

    /// Set the delay between recording a change and draining
    #[must_use]
    pub const fn with_enqueue_sync_delay(mut self, delay: Duration) -> Self {
        self.enqueue_sync_delay = Some(delay);
        self
    }

    /// Set the retry policy
    #[must_use]
    pub const fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Set the primary key field name
    #[must_use]
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    /// Set the last-modified marker field name
    #[must_use]
    pub fn with_modified_field(mut self, field: impl Into<String>) -> Self {
        self.modified_field = field.into();
        self
    }

    /// Disable follow-up drains after retryable failures
    #[must_use]
    pub const fn without_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    /// Disable automatic drains (reconnect drains still run)
    #[must_use]
    pub const fn without_auto_sync(mut self) -> Self {
        self.enqueue_sync_delay = None;
        self.retry = None;
        self
    }
}

/// Connection settings for the HTTP remote store
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Endpoint root, without trailing slash
    pub base_url: String,
    /// Project API key
    pub api_key: Option<String>,
    /// User access token
    pub access_token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteConfig {
    /// Create a configuration for the given endpoint root
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url.into())?,
            api_key: None,
            access_token: None,
            timeout: DEFAULT_REMOTE_TIMEOUT,
        })
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = non_blank(Some(api_key.into()));
        self
    }

    /// Set the access token
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = non_blank(Some(token.into()));
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from `GRIDSYNC_REST_URL`, `GRIDSYNC_API_KEY` and
    /// `GRIDSYNC_ACCESS_TOKEN`.
    ///
    /// Returns `Ok(None)` when no URL is configured.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let Some(base_url) = non_blank(lookup(ENV_REST_URL)) else {
            return Ok(None);
        };

        let mut config = Self::new(base_url)?;
        config.api_key = non_blank(lookup(ENV_API_KEY));
        config.access_token = non_blank(lookup(ENV_ACCESS_TOKEN));
        Ok(Some(config))
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let url = non_blank(Some(raw))
        .ok_or_else(|| Error::InvalidInput("remote URL must not be empty".to_string()))?;
    if !is_http_url(&url) {
        return Err(Error::InvalidInput(format!(
            "remote URL must include http:// or https://: {url}"
        )));
    }
    Ok(url.trim_end_matches('/').to_string())
}
