use std::path::Path;

use crate::commands::common::{open_session, OpenMode};
use crate::error::CliError;

pub async fn run_reset(confirmed: bool, db_path: &Path) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ResetNotConfirmed);
    }

    let session = open_session(db_path, OpenMode::Local).await?;
    let lost = session.controller.status().pending_count;
    session.controller.clear_all().await?;

    if lost > 0 {
        println!("Offline data cleared ({lost} unsynced change(s) discarded)");
    } else {
        println!("Offline data cleared");
    }
    Ok(())
}
