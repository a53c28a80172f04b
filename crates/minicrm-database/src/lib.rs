//! SQLite data-access layer for MiniCRM.
//!
//! [`EnhancedDatabaseManager`] bundles a bounded [`ConnectionPool`], a
//! [`RetryManager`] for transient failures, the [`DatabaseMigration`] runner
//! and the [`DatabaseHooks`] registry behind one facade.
//!
//! ```no_run
//! use minicrm_database::{DatabaseConfig, EnhancedDatabaseManager, Value};
//!
//! # fn main() -> minicrm_database::Result<()> {
//! let db = EnhancedDatabaseManager::new(DatabaseConfig::new("minicrm.db"))?;
//! db.initialize_database()?;
//!
//! let id = db.execute_insert(
//!     "INSERT INTO customers (name, phone) VALUES (?1, ?2)",
//!     &[Value::Text("Acme Building Supply".into()), Value::Text("555-0100".into())],
//!     "customers",
//! )?;
//! let rows = db.execute_query("SELECT name FROM customers WHERE id = ?1", &[Value::Integer(id)])?;
//! assert_eq!(rows.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hooks;
pub mod manager;
pub mod migration;
pub mod pool;
pub mod retry;
pub mod sqlite_config;
pub mod transaction;

pub use error::{DatabaseError, ErrorKind, Result, ValidationError};
pub use hooks::{
    AfterHook, AuditCounts, AuditHook, BeforeHook, DatabaseHooks, Hook, HookContext,
    HookOperation, HookOverrides, HookTiming, OperationOutcome, StatementValidationHook,
};
pub use manager::{DatabaseConfig, EnhancedDatabaseManager, Row};
pub use migration::{DatabaseMigration, Migration, MigrationError, MigrationRecord, MigrationReport};
pub use pool::{
    ConnectionManager, ConnectionPool, PoolConfig, PoolStats, PooledConnection,
    SqliteConnectionManager,
};
pub use retry::{RetryConfig, RetryManager, Sleeper, ThreadSleeper};
pub use sqlite_config::{JournalMode, SqliteConfig, SqliteConfigQuery};
pub use transaction::DatabaseTransaction;

/// Re-exported so callers can build parameters without a direct dependency.
pub use rusqlite::types::Value;
