//! Per-connection SQLite pragmas.

use crate::error::{DatabaseError, Result};
use rusqlite::Connection;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Journal mode (WAL recommended for a pooled file database)
    pub journal_mode: JournalMode,
    /// Synchronous mode
    pub synchronous: Synchronous,
    /// Cache size in pages (negative for KiB)
    pub cache_size: i64,
    /// Temp store location
    pub temp_store: TempStore,
    /// Foreign keys enforcement
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    #[default]
    Wal,
    Off,
}

impl JournalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }
}

impl FromStr for JournalMode {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "delete" => Ok(Self::Delete),
            "truncate" => Ok(Self::Truncate),
            "persist" => Ok(Self::Persist),
            "memory" => Ok(Self::Memory),
            "wal" => Ok(Self::Wal),
            "off" => Ok(Self::Off),
            other => Err(DatabaseError::Config(format!("unknown journal mode: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Synchronous {
    Off,
    #[default]
    Normal,
    Full,
    Extra,
}

impl Synchronous {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
            Self::Extra => "EXTRA",
        }
    }
}

impl FromStr for Synchronous {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "normal" => Ok(Self::Normal),
            "full" => Ok(Self::Full),
            "extra" => Ok(Self::Extra),
            other => Err(DatabaseError::Config(format!("unknown synchronous mode: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TempStore {
    #[default]
    Default,
    File,
    Memory,
}

impl TempStore {
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Default => 0,
            Self::File => 1,
            Self::Memory => 2,
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::Wal,
            synchronous: Synchronous::Normal,
            cache_size: -16000, // 16MB
            temp_store: TempStore::Memory,
            foreign_keys: true,
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Configuration for testing (fast, less durable)
    pub fn testing() -> Self {
        Self {
            journal_mode: JournalMode::Memory,
            synchronous: Synchronous::Off,
            busy_timeout_ms: 1000,
            ..Default::default()
        }
    }

    /// Apply configuration to a freshly opened connection.
    pub fn apply(&self, conn: &Connection) -> Result<()> {
        conn.busy_timeout(std::time::Duration::from_millis(u64::from(self.busy_timeout_ms)))?;

        // journal_mode answers with a row, so it can't go through execute_batch
        let mode: String = conn.query_row(
            &format!("PRAGMA journal_mode = {}", self.journal_mode.as_str()),
            [],
            |row| row.get(0),
        )?;
        debug!(requested = self.journal_mode.as_str(), actual = %mode, "journal mode set");

        let pragmas = format!(
            "PRAGMA synchronous = {};\n\
             PRAGMA cache_size = {};\n\
             PRAGMA temp_store = {};\n\
             PRAGMA foreign_keys = {};",
            self.synchronous.as_str(),
            self.cache_size,
            self.temp_store.as_i32(),
            if self.foreign_keys { "ON" } else { "OFF" },
        );
        conn.execute_batch(&pragmas)?;

        Ok(())
    }
}

/// Read-only queries against a connection's current configuration.
pub struct SqliteConfigQuery;

impl SqliteConfigQuery {
    pub fn journal_mode(conn: &Connection) -> Result<String> {
        Ok(conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?)
    }

    pub fn foreign_keys(conn: &Connection) -> Result<bool> {
        let on: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        Ok(on == 1)
    }

    /// Rows reported by `PRAGMA integrity_check`; `["ok"]` when healthy.
    pub fn integrity_check(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("PRAGMA integrity_check")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn database_size(conn: &Connection) -> Result<DatabaseSize> {
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let freelist_count: i64 = conn.query_row("PRAGMA freelist_count", [], |row| row.get(0))?;

        Ok(DatabaseSize {
            page_size,
            page_count,
            freelist_count,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSize {
    pub page_size: i64,
    pub page_count: i64,
    pub freelist_count: i64,
}

impl DatabaseSize {
    pub fn total_bytes(&self) -> i64 {
        self.page_size * self.page_count
    }

    pub fn free_bytes(&self) -> i64 {
        self.page_size * self.freelist_count
    }

    pub fn fragmentation_ratio(&self) -> f64 {
        if self.total_bytes() == 0 {
            return 0.0;
        }
        self.free_bytes() as f64 / self.total_bytes() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SqliteConfig::default();
        assert!(config.foreign_keys);
        assert_eq!(config.journal_mode, JournalMode::Wal);
    }

    #[test]
    fn test_journal_mode_from_str() {
        assert_eq!("WAL".parse::<JournalMode>().unwrap(), JournalMode::Wal);
        assert_eq!("truncate".parse::<JournalMode>().unwrap(), JournalMode::Truncate);
        assert!(matches!(
            "journaled".parse::<JournalMode>(),
            Err(DatabaseError::Config(_))
        ));
    }

    #[test]
    fn test_apply_config() {
        let conn = Connection::open_in_memory().unwrap();
        SqliteConfig::testing().apply(&conn).unwrap();

        let journal = SqliteConfigQuery::journal_mode(&conn).unwrap();
        assert_eq!(journal.to_lowercase(), "memory");
        assert!(SqliteConfigQuery::foreign_keys(&conn).unwrap());
    }

    #[test]
    fn test_wal_on_file_database() {
        let (_dir, path) = minicrm_test_utils::temp_db_path("wal");
        let conn = Connection::open(&path).unwrap();
        SqliteConfig::default().apply(&conn).unwrap();

        assert_eq!(SqliteConfigQuery::journal_mode(&conn).unwrap().to_lowercase(), "wal");
        assert_eq!(SqliteConfigQuery::integrity_check(&conn).unwrap(), vec!["ok".to_string()]);
    }

    #[test]
    fn test_database_size() {
        let conn = Connection::open_in_memory().unwrap();
        let size = SqliteConfigQuery::database_size(&conn).unwrap();
        assert!(size.page_size > 0);
        assert!(size.fragmentation_ratio() >= 0.0);
    }
}
