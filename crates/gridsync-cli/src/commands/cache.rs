use std::path::Path;

use crate::commands::common::{normalize_collection, open_session, OpenMode};
use crate::error::CliError;

pub async fn run_cache_list(
    collection: &str,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let collection = normalize_collection(collection)?;
    let session = open_session(db_path, OpenMode::Local).await?;
    let rows = session.controller.read_cached_rows(&collection).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No cached rows for {collection}.");
        return Ok(());
    }

    for row in &rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}

pub async fn run_cache_refresh(collection: &str, db_path: &Path) -> Result<usize, CliError> {
    let collection = normalize_collection(collection)?;
    let session = open_session(db_path, OpenMode::RequireRemote).await?;
    let count = session.controller.refresh_cached_rows(&collection).await?;

    println!("Cached {count} row(s) from {collection}");
    Ok(count)
}
