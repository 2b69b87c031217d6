use std::path::Path;

use gridsync_core::{StorageEstimate, SyncStatus};
use serde::Serialize;

use crate::commands::common::{format_bytes, format_sync_timestamp, open_session, OpenMode};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub status: SyncStatus,
    pub remote_configured: bool,
    pub storage: Option<StorageEstimate>,
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let session = open_session(db_path, OpenMode::Probe).await?;
    let controller = &session.controller;

    let storage = match controller.storage_estimate().await {
        Ok(estimate) => Some(estimate),
        Err(error) => {
            tracing::warn!("Storage estimate unavailable: {}", error);
            None
        }
    };
    let report = StatusReport {
        status: controller.status(),
        remote_configured: session.remote_configured,
        storage,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_status_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let status = &report.status;
    let connectivity = match (report.remote_configured, status.is_online) {
        (false, _) => "offline (no remote configured)",
        (true, true) => "online",
        (true, false) => "offline",
    };
    let last_sync = status
        .last_sync_time
        .map_or_else(|| "never".to_string(), format_sync_timestamp);
    let storage = report.storage.map_or_else(
        || "unknown".to_string(),
        |estimate| match estimate.usage_percent() {
            Some(percent) => format!("{} ({percent:.1}%)", format_bytes(estimate.used_bytes)),
            None => format_bytes(estimate.used_bytes),
        },
    );

    vec![
        format!("Connectivity: {connectivity}"),
        format!(
            "Local store:  {}",
            if status.is_ready { "ready" } else { "unavailable" }
        ),
        format!("Pending:      {}", status.pending_count),
        format!("Last sync:    {last_sync}"),
        format!("Storage:      {storage}"),
    ]
}
