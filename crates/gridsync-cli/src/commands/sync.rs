use std::path::Path;

use gridsync_core::SyncOutcome;

use crate::commands::common::{open_session, OpenMode};
use crate::error::CliError;

pub async fn run_sync(as_json: bool, db_path: &Path) -> Result<SyncOutcome, CliError> {
    let session = open_session(db_path, OpenMode::RequireRemote).await?;
    let controller = &session.controller;
    if !controller.is_online() {
        tracing::warn!("Remote store unreachable, changes stay queued");
    }

    let outcome = controller.request_sync().await;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for line in format_outcome_lines(&outcome, controller.status().pending_count) {
            println!("{line}");
        }
    }
    Ok(outcome)
}

pub fn format_outcome_lines(outcome: &SyncOutcome, remaining: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "Synced {} change(s), {} failed, {} pending",
        outcome.synced_count, outcome.failed_count, remaining
    )];
    for failure in &outcome.errors {
        let target = failure
            .change_id
            .as_ref()
            .map_or_else(|| "queue".to_string(), ToString::to_string);
        let hint = if failure.retryable { "will retry" } else { "needs attention" };
        lines.push(format!("  {target}: {} ({hint})", failure.reason));
    }
    lines
}
