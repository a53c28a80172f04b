use chrono::{DateTime, Utc};
use semver::Version;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("invalid version {version:?}: {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("no migration registered for version {0}")]
    UnknownVersion(Version),

    #[error("cannot migrate down from {current} to {target}")]
    Downgrade { current: Version, target: Version },

    #[error("migration {version} statement #{index} failed: {source}")]
    StatementFailed {
        version: Version,
        index: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("migration {version} registered twice")]
    Duplicate { version: Version },
}

/// Parse a version string such as `"1.0.0"`.
pub fn parse_version(version: &str) -> Result<Version, MigrationError> {
    Version::parse(version.trim()).map_err(|source| MigrationError::InvalidVersion {
        version: version.to_string(),
        source,
    })
}

/// One schema step, applied when moving past `version`.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: Version,
    pub description: String,
    /// Executed in order inside the migration transaction
    pub statements: Vec<String>,
}

impl Migration {
    pub fn new(version: Version, description: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            statements: Vec::new(),
        }
    }

    pub fn statement(mut self, sql: impl Into<String>) -> Self {
        self.statements.push(sql.into());
        self
    }
}

/// A row of `database_versions`.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRecord {
    pub id: i64,
    pub version: Version,
    pub applied_at: DateTime<Utc>,
    pub description: Option<String>,
}

/// What a `migrate_to_version` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: Version,
    pub to: Version,
    /// Versions applied, ascending. Empty when already at the target.
    pub applied: Vec<Version>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}
