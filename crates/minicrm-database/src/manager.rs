//! The data-access facade business services talk to.

use crate::error::{DatabaseError, Result};
use crate::hooks::{
    AuditCounts, AuditHook, DatabaseHooks, Hook, HookContext, HookOperation, OperationOutcome,
    StatementValidationHook,
};
use crate::migration::{DatabaseMigration, BASELINE_VERSION};
use crate::pool::{ConnectionPool, PoolConfig, PoolStats, PooledConnection};
use crate::retry::{RetryConfig, RetryManager};
use crate::sqlite_config::{JournalMode, SqliteConfig, Synchronous};
use crate::transaction::DatabaseTransaction;
use minicrm_common_config::DatabaseSettings;
use minicrm_common_log::spans::{database_span, Timer};
use rusqlite::backup::Backup;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

fn affected(_conn: &Connection, changed: usize) -> (usize, OperationOutcome) {
    (changed, OperationOutcome::Affected(changed))
}

/// A result row keyed by column name.
pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    pub pool: PoolConfig,
    pub retry: RetryConfig,
}

impl DatabaseConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            pool: PoolConfig {
                database_path: database_path.into(),
                ..Default::default()
            },
            retry: RetryConfig::default(),
        }
    }

    pub fn from_settings(settings: &DatabaseSettings) -> Result<Self> {
        let journal_mode: JournalMode = settings.journal_mode.parse()?;
        let synchronous: Synchronous = settings.synchronous.parse()?;
        let sqlite = SqliteConfig {
            journal_mode,
            synchronous,
            busy_timeout_ms: settings.busy_timeout_ms,
            ..Default::default()
        };

        let pool = PoolConfig::builder()
            .database_path(&settings.db_path)
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .sqlite(sqlite)
            .build()?;

        Ok(Self {
            pool,
            retry: RetryConfig {
                max_retries: settings.max_retries,
                base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            },
        })
    }
}

/// Pooled, retrying, hookable access to the MiniCRM database.
pub struct EnhancedDatabaseManager {
    pool: Arc<ConnectionPool>,
    retry: RetryManager,
    migration: DatabaseMigration,
    hooks: Arc<DatabaseHooks>,
    audit: Arc<AuditHook>,
    defaults_installed: AtomicBool,
}

impl EnhancedDatabaseManager {
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        let retry = RetryManager::new(config.retry.clone());
        Self::with_retry_manager(config, retry)
    }

    /// Build the facade around a caller-supplied retry policy.
    pub fn with_retry_manager(config: DatabaseConfig, retry: RetryManager) -> Result<Self> {
        let pool = Arc::new(ConnectionPool::open(&config.pool)?);
        let migration = DatabaseMigration::new(pool.clone());

        Ok(Self {
            pool,
            retry,
            migration,
            hooks: Arc::new(DatabaseHooks::new()),
            audit: Arc::new(AuditHook::new()),
            defaults_installed: AtomicBool::new(false),
        })
    }

    /// Migrate to the baseline schema and install the default hooks.
    ///
    /// Safe to call more than once; hooks are installed only the first time
    /// and a database already past the baseline is left alone.
    #[instrument(skip(self))]
    pub fn initialize_database(&self) -> Result<()> {
        if self.migration.current_version()? < BASELINE_VERSION {
            self.migration.migrate_to_version(&BASELINE_VERSION.to_string())?;
        }

        if !self.defaults_installed.swap(true, Ordering::SeqCst) {
            for operation in HookOperation::ALL {
                self.hooks.register_before_hook(operation, StatementValidationHook);
                self.hooks.register(operation, Hook::After(self.audit.clone()));
            }
        }

        info!("database initialized");
        Ok(())
    }

    pub fn get_connection(&self) -> Result<PooledConnection<'_>> {
        self.pool.get_connection()
    }

    /// Check out a connection and open a transaction on it.
    pub fn begin(&self) -> Result<DatabaseTransaction<'_>> {
        DatabaseTransaction::begin(self.pool.get_connection()?)
    }

    /// Run `f` inside a transaction: commit when it returns `Ok`, roll back
    /// and return its error otherwise.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = self.begin()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => Err(tx.abort(e)),
        }
    }

    #[instrument(skip(self, params))]
    pub fn execute_query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let timer = Timer::start("execute_query");
        let rows = self.retry.retry_on_error(|| {
            let conn = self.pool.get_connection()?;
            query_rows(&conn, sql, params)
        })?;
        timer.finish();
        Ok(rows)
    }

    /// Insert a row and return its row id.
    pub fn execute_insert(&self, sql: &str, params: &[Value], table_name: &str) -> Result<i64> {
        self.execute_write(HookOperation::Insert, sql, params, table_name, |conn, _| {
            let id = conn.last_insert_rowid();
            (id, OperationOutcome::Inserted(id))
        })
    }

    /// Run an UPDATE and return the number of rows changed.
    pub fn execute_update(&self, sql: &str, params: &[Value], table_name: &str) -> Result<usize> {
        self.execute_write(HookOperation::Update, sql, params, table_name, affected)
    }

    /// Run a DELETE and return the number of rows removed.
    pub fn execute_delete(&self, sql: &str, params: &[Value], table_name: &str) -> Result<usize> {
        self.execute_write(HookOperation::Delete, sql, params, table_name, affected)
    }

    /// Run a hooked, retried write. `finish` turns the connection and the
    /// changed-row count into the caller's value and the hooks' outcome.
    fn execute_write<T, F>(
        &self,
        operation: HookOperation,
        sql: &str,
        params: &[Value],
        table_name: &str,
        finish: F,
    ) -> Result<T>
    where
        F: Fn(&Connection, usize) -> (T, OperationOutcome),
    {
        let span = database_span(operation.as_str(), table_name);
        let _entered = span.enter();

        let mut ctx = HookContext::new(operation, table_name, sql, params.to_vec());
        self.hooks.execute_before_hooks(&mut ctx)?;

        let (value, outcome) = self.retry.retry_on_error(|| {
            let conn = self.pool.get_connection()?;
            let changed = conn.execute(&ctx.sql, params_from_iter(ctx.params.iter()))?;
            Ok(finish(&*conn, changed))
        })?;

        self.hooks.execute_after_hooks(&ctx, &outcome);
        Ok(value)
    }

    /// Copy the live database to `path` with SQLite's online backup.
    ///
    /// Returns `false` and logs the cause when anything goes wrong.
    #[instrument(skip(self, path))]
    pub fn backup_database(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.try_backup(path) {
            Ok(()) => {
                info!(path = %path.display(), "database backup completed");
                true
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "database backup failed");
                false
            }
        }
    }

    fn try_backup(&self, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let src = self.pool.get_connection()?;
        let mut dst = Connection::open(dest).map_err(|source| DatabaseError::Connect {
            path: dest.display().to_string(),
            source,
        })?;

        let backup = Backup::new(&src, &mut dst)?;
        backup.run_to_completion(100, Duration::from_millis(10), None)?;
        Ok(())
    }

    pub fn register_hook(&self, operation: HookOperation, hook: Hook) {
        self.hooks.register(operation, hook);
    }

    pub fn get_migration_manager(&self) -> &DatabaseMigration {
        &self.migration
    }

    pub fn get_hooks_manager(&self) -> &Arc<DatabaseHooks> {
        &self.hooks
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn health_check(&self) -> Result<()> {
        self.pool.health_check()
    }

    /// Writes seen by the default audit hook since startup.
    pub fn audit_counts(&self) -> AuditCounts {
        self.audit.counts()
    }

    /// Close every pooled connection. Further calls fail with `PoolClosed`.
    pub fn close(&self) {
        self.pool.close();
        info!("database manager closed");
    }
}

impl std::fmt::Debug for EnhancedDatabaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancedDatabaseManager")
            .field("pool", &self.pool.stats())
            .field("retry", &self.retry)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

fn query_rows(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (index, name) in columns.iter().enumerate() {
            record.insert(name.clone(), row.get::<_, Value>(index)?);
        }
        out.push(record);
    }
    Ok(out)
}
