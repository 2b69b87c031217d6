use std::path::Path;

use gridsync_core::PendingChangeId;

use crate::cli::OperationArg;
use crate::commands::common::{normalize_collection, open_session, parse_row, OpenMode};
use crate::error::CliError;

pub async fn run_record(
    operation: OperationArg,
    collection: &str,
    payload: &str,
    prior: Option<&str>,
    db_path: &Path,
) -> Result<PendingChangeId, CliError> {
    let collection = normalize_collection(collection)?;
    let payload = parse_row(payload, "payload")?;
    let prior_payload = prior.map(|raw| parse_row(raw, "prior payload")).transpose()?;

    let session = open_session(db_path, OpenMode::Local).await?;
    let id = session
        .controller
        .record_pending_change(operation.into(), &collection, payload, prior_payload)
        .await?;

    println!("{id}");
    Ok(id)
}
