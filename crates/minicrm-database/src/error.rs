//! Error taxonomy for the data-access layer.
//!
//! Every failure that leaves this crate is a [`DatabaseError`]. Each variant
//! carries an [`ErrorKind`] tag; the retry policy only ever looks at the tag.

use crate::migration::MigrationError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Whether retrying the failed operation can reasonably succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Contention or a connection problem; worth another attempt.
    Transient,
    /// Retrying would fail the same way.
    Permanent,
}

/// Input rejected before it reached the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Offending field, when the failure is tied to one.
    pub field: Option<String>,
    /// What is wrong.
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// The single error type surfaced by the data-access facade.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("connection pool exhausted: no connection available within {0:?}")]
    PoolExhausted(Duration),

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("failed to open database {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("health check failed: {0}")]
    HealthCheck(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<DatabaseError>,
    },

    #[error("rollback failed after {cause}: {source}")]
    Rollback {
        cause: Box<DatabaseError>,
        #[source]
        source: rusqlite::Error,
    },

    #[error("migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatabaseError {
    /// Shorthand for a validation failure without a field.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(message))
    }

    /// Classify the error for the retry policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PoolExhausted(_) => ErrorKind::Transient,
            Self::Connect { source, .. } | Self::Sqlite(source) => sqlite_error_kind(source),
            Self::RetriesExhausted { .. }
            | Self::PoolClosed
            | Self::Rollback { .. }
            | Self::HealthCheck(_)
            | Self::Migration(_)
            | Self::Config(_)
            | Self::Validation(_)
            | Self::Io(_) => ErrorKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Busy/locked databases and files that could not be opened are worth
/// retrying; everything else the driver reports is not.
fn sqlite_error_kind(error: &rusqlite::Error) -> ErrorKind {
    match error {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            rusqlite::ErrorCode::DatabaseBusy
            | rusqlite::ErrorCode::DatabaseLocked
            | rusqlite::ErrorCode::CannotOpen => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        },
        _ => ErrorKind::Permanent,
    }
}

/// Result alias for the data-access layer.
pub type Result<T> = std::result::Result<T, DatabaseError>;
