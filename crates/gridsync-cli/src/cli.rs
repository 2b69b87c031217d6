use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "gridsync")]
#[command(about = "Queue grid edits offline and replay them against the remote store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show connectivity, queue and storage status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List unsynced changes in replay order
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a local change
    Record {
        /// Mutation kind
        #[arg(value_enum)]
        operation: OperationArg,
        /// Target table
        #[arg(short, long)]
        collection: String,
        /// Row as a JSON object
        #[arg(short, long)]
        payload: String,
        /// Row state before the change, as a JSON object
        #[arg(long)]
        prior: Option<String>,
    },
    /// Replay pending changes against the remote store
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or refresh cached rows
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Delete cached rows and every pending change
    Reset {
        /// Confirm that unsynced changes may be lost
        #[arg(long)]
        yes: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Print cached rows of a table
    List {
        /// Target table
        #[arg(short, long)]
        collection: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch a table from the remote store and cache it
    Refresh {
        /// Target table
        #[arg(short, long)]
        collection: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OperationArg {
    Insert,
    Update,
    Delete,
}

impl From<OperationArg> for gridsync_core::Operation {
    fn from(value: OperationArg) -> Self {
        match value {
            OperationArg::Insert => Self::Insert,
            OperationArg::Update => Self::Update,
            OperationArg::Delete => Self::Delete,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
