use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gridsync_core::config::{ENV_DB_PATH, ENV_PROBE_URL};
use gridsync_core::models::into_row;
use gridsync_core::{
    Connectivity, ConnectivityController, LocalStore, MemoryRemoteStore, PendingChange,
    ReachabilityProbe, RemoteConfig, RemoteStore, RestRemoteStore, Row, StoreLocation, SyncConfig,
};
use serde::Serialize;

use crate::error::CliError;

const PROBE_INTERVAL: Duration = Duration::from_secs(30);
const PAYLOAD_PREVIEW_CHARS: usize = 60;

#[derive(Debug, Serialize)]
pub struct PendingChangeItem {
    pub id: String,
    pub operation: String,
    pub collection: String,
    pub payload: Row,
    pub prior_payload: Option<Row>,
    pub created_at: i64,
    pub relative_time: String,
    pub attempts: u32,
    pub last_error: Option<String>,
}

#[derive(Clone, Copy)]
pub enum OpenMode {
    /// Local store only; the remote is never contacted
    Local,
    /// Probe the remote when one is configured
    Probe,
    /// Fail unless a remote is configured
    RequireRemote,
}

/// A controller wired to the local store at `db_path`
pub struct Session {
    pub controller: ConnectivityController,
    pub remote_configured: bool,
}

pub async fn open_session(db_path: &Path, mode: OpenMode) -> Result<Session, CliError> {
    let remote_config = RemoteConfig::from_env()?;
    if matches!(mode, OpenMode::RequireRemote) && remote_config.is_none() {
        return Err(CliError::RemoteNotConfigured);
    }

    let connectivity = match (&remote_config, mode) {
        (Some(config), OpenMode::Probe | OpenMode::RequireRemote) => {
            detect_connectivity(config).await
        }
        _ => Connectivity::Offline,
    };

    let remote_configured = remote_config.is_some();
    let remote: Arc<dyn RemoteStore> = match remote_config {
        Some(config) => Arc::new(RestRemoteStore::new(config)?),
        None => Arc::new(MemoryRemoteStore::new()),
    };

    let store = Arc::new(LocalStore::new(StoreLocation::path(db_path)));
    // One-shot process: drains only happen when a command asks for one.
    let controller = ConnectivityController::new(
        store,
        remote,
        connectivity,
        SyncConfig::new().without_auto_sync(),
    )
    .await;

    Ok(Session {
        controller,
        remote_configured,
    })
}

async fn detect_connectivity(config: &RemoteConfig) -> Connectivity {
    let url = env::var(ENV_PROBE_URL)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| config.base_url.clone());

    match ReachabilityProbe::new(url, PROBE_INTERVAL) {
        Ok(probe) => probe.check().await,
        Err(error) => {
            tracing::warn!("Invalid probe URL, assuming offline: {}", error);
            Connectivity::Offline
        }
    }
}

pub fn normalize_collection(collection: &str) -> Result<String, CliError> {
    let trimmed = collection.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyCollection)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn parse_row(raw: &str, label: &'static str) -> Result<Row, CliError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    into_row(value).ok_or(CliError::InvalidRow(label))
}

pub fn pending_change_to_item(change: &PendingChange, now_ms: i64) -> PendingChangeItem {
    PendingChangeItem {
        id: change.id.to_string(),
        operation: change.operation.to_string(),
        collection: change.collection.clone(),
        payload: change.payload.clone(),
        prior_payload: change.prior_payload.clone(),
        created_at: change.created_at,
        relative_time: format_relative_time(change.created_at, now_ms),
        attempts: change.attempts,
        last_error: change.last_error.clone(),
    }
}

pub fn format_pending_lines(changes: &[PendingChange], now_ms: i64) -> Vec<String> {
    changes
        .iter()
        .map(|change| {
            let mut line = format!(
                "{}  {:<6}  {:<16}  {:<10}  {}",
                change.id,
                change.operation.as_str(),
                change.collection,
                format_relative_time(change.created_at, now_ms),
                payload_preview(&change.payload, PAYLOAD_PREVIEW_CHARS)
            );
            if let Some(error) = &change.last_error {
                line.push_str(&format!("  [{} failed: {error}]", change.attempts));
            }
            line
        })
        .collect()
}

pub fn payload_preview(row: &Row, max_chars: usize) -> String {
    let text = serde_json::Value::Object(row.clone()).to_string();
    if text.chars().count() <= max_chars {
        return text;
    }
    let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{truncated}...")
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut unit = 0;
    let mut whole = bytes;
    while whole >= 1024 && unit < UNITS.len() - 1 {
        whole /= 1024;
        unit += 1;
    }
    format!("{whole} {}", UNITS[unit])
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(ENV_DB_PATH).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gridsync")
        .join("gridsync.db")
}
