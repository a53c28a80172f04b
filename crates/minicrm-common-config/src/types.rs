//! Configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, read from `.minicrm/config.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MiniCrmConfig {
    /// Data-access layer settings.
    pub database: DatabaseSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Upper bound on live pooled connections.
    pub max_connections: u32,
    /// How long a checkout may wait for an idle connection.
    pub acquire_timeout_secs: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// First backoff step; doubles on every retry.
    pub retry_base_delay_ms: u64,
    /// SQLite busy handler timeout.
    pub busy_timeout_ms: u32,
    /// SQLite journal mode (`wal`, `delete`, `truncate`, `memory`, ...).
    pub journal_mode: String,
    /// SQLite `synchronous` pragma (`off`, `normal`, `full`, `extra`).
    pub synchronous: String,
    /// Default directory for backups made by the CLI.
    pub backup_dir: Option<PathBuf>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("minicrm.db"),
            max_connections: 5,
            acquire_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 100,
            busy_timeout_ms: 5000,
            journal_mode: "wal".to_string(),
            synchronous: "normal".to_string(),
            backup_dir: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Minimum level (`trace` .. `error`).
    pub level: String,
    /// Output format (`pretty`, `compact`, `json`).
    pub format: String,
    /// Optional log file, appended to.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}
