use std::path::Path;

use crate::commands::common::{
    format_pending_lines, open_session, pending_change_to_item, OpenMode, PendingChangeItem,
};
use crate::error::CliError;

pub async fn run_pending(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let session = open_session(db_path, OpenMode::Local).await?;
    let changes = session.controller.list_pending().await?;
    let now_ms = chrono::Utc::now().timestamp_millis();

    if as_json {
        let json_items = changes
            .iter()
            .map(|change| pending_change_to_item(change, now_ms))
            .collect::<Vec<PendingChangeItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if changes.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }

    for line in format_pending_lines(&changes, now_ms) {
        println!("{line}");
    }
    Ok(())
}
