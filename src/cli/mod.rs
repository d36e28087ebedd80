//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;

pub mod commands;

/// filmsync - incremental catalog to search index synchronization
#[derive(Parser, Debug)]
#[command(name = "filmsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON config file (settings below override it)
    #[arg(long, global = true, env = "FILMSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Connection and pipeline settings.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Catalog SQLite database
    #[arg(long, global = true, env = "FILMSYNC_SOURCE_DB")]
    pub source_db: Option<PathBuf>,

    /// Elasticsearch base URL (default: http://localhost:9200)
    #[arg(long, global = true, env = "ELASTIC_URL")]
    pub elastic_url: Option<String>,

    /// Target index name (default: movies)
    #[arg(long, global = true, env = "ELASTIC_INDEX_NAME")]
    pub index_name: Option<String>,

    /// Rows per batch (default: 50)
    #[arg(long, global = true, env = "DATA_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Checkpoint file (default: platform data dir)
    #[arg(long, global = true, env = "FILMSYNC_STATE_PATH")]
    pub state_path: Option<PathBuf>,

    /// Seconds to wait between passes (default: 10)
    #[arg(long, global = true, env = "FILMSYNC_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,
}

impl SettingsArgs {
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            source_db: self.source_db.clone(),
            elastic_url: self.elastic_url.clone(),
            index_name: self.index_name.clone(),
            batch_size: self.batch_size,
            state_path: self.state_path.clone(),
            poll_interval_secs: self.poll_interval,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the sync daemon
    Run {
        /// Drain every stream once, then exit
        #[arg(long)]
        once: bool,

        /// Index into memory and keep checkpoints untouched (implies --once)
        #[arg(long)]
        dry_run: bool,
    },

    /// Target index management
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },

    /// Watermark inspection and reset
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },

    /// Source database helpers
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum IndexCommands {
    /// Create the index with its mapping unless it exists
    Ensure,

    /// Print the index settings and mapping
    Schema,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CheckpointCommands {
    /// Show the watermark of every stream
    Show,

    /// Forget watermarks so streams rescan from the beginning
    Reset {
        /// Stream to reset (film_work, person, genre)
        #[arg(required_unless_present = "all")]
        stream: Option<String>,

        /// Reset every stream
        #[arg(long, conflicts_with = "stream")]
        all: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SourceCommands {
    /// Create the catalog relations in a new or existing database
    Init {
        /// Database file (default: --source-db)
        path: Option<PathBuf>,
    },
}
