//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// MiniCRM database administration
#[derive(Debug, Parser)]
#[command(
    name = "minicrm-db",
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Project directory holding `.minicrm/config.yaml`
    #[arg(
        long,
        global = true,
        default_value = ".",
        env = "MINICRM_CONFIG_DIR",
        value_hint = ValueHint::DirPath
    )]
    pub config_dir: PathBuf,

    /// Database file, overriding the configured `db_path`
    #[arg(
        short,
        long,
        global = true,
        env = "MINICRM_DB_PATH",
        value_hint = ValueHint::FilePath
    )]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the baseline schema and default hooks
    Init,

    /// Migrate the schema to a registered version
    Migrate {
        /// Target version (defaults to the latest registered one)
        #[arg(long)]
        to: Option<String>,
    },

    /// Show the current version, history and pending migrations
    Status,

    /// Copy the database with SQLite's online backup
    Backup {
        /// Destination file (defaults to a timestamped file in `backup_dir`)
        #[arg(value_hint = ValueHint::FilePath)]
        path: Option<PathBuf>,
    },

    /// Run health and integrity checks
    Check,
}
