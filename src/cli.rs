//! Command-line interface definitions for the `tide` binary.
//!
//! Argument parsing structures using clap's derive macros. Field-level
//! documentation is provided via clap attributes, so missing_docs is
//! allowed here to avoid duplicating every help string.

#![allow(missing_docs)]

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Main CLI structure for tide.
#[derive(Parser)]
#[command(
    name = "tide",
    version = crate::VERSION,
    about = "Incremental backups with compact manifests and safe retention",
    long_about = "Copies only what changed since the previous backup, records each run in a \
                  compact manifest, and can safely delete backups that recorded nothing useful"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// All available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Back up a directory tree into a target directory
    Backup {
        /// Directory to back up
        source: String,

        /// Directory holding the backups
        target: String,

        /// Path exclusion pattern (regex against a /-rendered relative
        /// path, trailing / for directories); may be repeated
        #[arg(short, long = "exclude", value_name = "PATTERN")]
        exclude_patterns: Vec<String>,
    },

    /// Restore backed-up state into an empty directory
    Restore {
        /// Directory holding the backups
        target: String,

        /// Empty (or nonexistent) directory to restore into
        destination: String,

        /// Restore the state as of this backup name
        #[arg(long, conflicts_with = "as_of")]
        backup_name: Option<String>,

        /// Restore the state as of this RFC 3339 time, e.g. 2024-01-02T03:04:05Z
        #[arg(long, value_name = "TIME")]
        as_of: Option<String>,
    },

    /// Delete backups that recorded nothing useful
    Prune {
        /// Directory holding the backups
        target: String,

        /// Delete even backups whose directories contain unrecognised files
        #[arg(long)]
        prune_other_data: bool,

        /// Only report what would be deleted
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
