//! gridsync CLI - Inspect and drive the offline change queue
//!
//! Records grid edits into the local store, shows what is still pending, and
//! replays the queue against the configured REST endpoint.

mod cli;
mod commands;
mod error;

use clap::{CommandFactory, Parser};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli::{CacheCommands, Cli, Commands};
use crate::commands::cache::{run_cache_list, run_cache_refresh};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::pending::run_pending;
use crate::commands::record::run_record;
use crate::commands::reset::run_reset;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Some(Commands::Status { json }) => run_status(json, &db_path).await?,
        Some(Commands::Pending { json }) => run_pending(json, &db_path).await?,
        Some(Commands::Record {
            operation,
            collection,
            payload,
            prior,
        }) => {
            run_record(
                operation,
                &collection,
                &payload,
                prior.as_deref(),
                &db_path,
            )
            .await?;
        }
        Some(Commands::Sync { json }) => {
            run_sync(json, &db_path).await?;
        }
        Some(Commands::Cache { command }) => match command {
            CacheCommands::List { collection, json } => {
                run_cache_list(&collection, json, &db_path).await?;
            }
            CacheCommands::Refresh { collection } => {
                run_cache_refresh(&collection, &db_path).await?;
            }
        },
        Some(Commands::Reset { yes }) => run_reset(yes, &db_path).await?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
