use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "vidledger")]
#[command(about = "Keep a curated master list of a channel's videos in sync")]
#[command(version)]
pub struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Base directory (default: ~/.vidledger)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the master list from the channel's full inventory
    Rebuild {
        /// Skip the confirmation prompt and the truncated-fetch guard
        #[arg(short, long)]
        force: bool,

        /// Reset curated fields of every fetched item
        #[arg(long)]
        no_preserve: bool,

        /// Download transcripts for items that lack one
        #[arg(long)]
        download_transcripts: bool,

        /// Maximum transcripts to download
        #[arg(long, value_name = "N")]
        max_transcripts: Option<usize>,

        /// Download transcripts again even if present
        #[arg(long, requires = "download_transcripts")]
        force_transcripts: bool,
    },

    /// Add newly published items to the master list
    Update {
        /// Number of recent items to check (default: listing.max_items)
        #[arg(long, value_name = "N")]
        max_items: Option<usize>,

        /// Download transcripts for newly added items
        #[arg(long)]
        download_transcripts: bool,
    },

    /// Validate configuration and credentials without touching the network
    ValidateConfig,

    /// Manage transcripts
    Transcripts {
        #[command(subcommand)]
        action: TranscriptAction,
    },

    /// List items that still need a category
    ListUncategorized {
        /// Maximum items to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Walk uncategorized items and categorize them one by one
    Review,

    /// Assign categories to an item
    Categorize {
        /// Item id
        item_id: String,

        /// Categories (comma separated or repeated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        categories: Vec<String>,

        /// Relevance score (1-10)
        #[arg(short, long)]
        relevance: Option<i64>,

        /// Free-form notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Mark an item as priority in a category
    Priority {
        /// Item id
        item_id: String,

        /// Category
        category: String,

        /// Relevance score (1-10, default 10)
        #[arg(short, long)]
        relevance: Option<i64>,
    },

    /// Set the key topics of an item
    Topics {
        /// Item id
        item_id: String,

        /// Topics (comma separated or repeated)
        #[arg(value_delimiter = ',', required = true)]
        topics: Vec<String>,
    },

    /// Archive an item
    Archive {
        /// Item id
        item_id: String,
    },

    /// Show a report of the master list
    Report,

    /// Manage master list backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum TranscriptAction {
    /// Download transcripts (all missing ones, or the given ids)
    Download {
        /// Item ids (default: every item without a transcript)
        item_ids: Vec<String>,

        /// Maximum transcripts to download
        #[arg(long, value_name = "N")]
        max: Option<usize>,

        /// Download again even if present
        #[arg(short, long)]
        force: bool,
    },

    /// Ask the provider whether an item has a transcript (downloads nothing)
    Check {
        /// Item id
        item_id: String,
    },

    /// Show transcript coverage
    Stats,

    /// List items without a transcript file
    Missing {
        /// Maximum items to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum BackupAction {
    /// List backups, newest first
    List,

    /// Restore a backup (the current state is backed up first)
    Restore {
        /// Backup file name (from `backup list`)
        name: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a commented config.toml if none exists
    Init,

    /// Show effective configuration (secrets masked)
    Show,

    /// Show config file path
    Path,

    /// Get a config value
    Get {
        /// Config key (e.g., listing.strategy)
        key: String,
    },
}
