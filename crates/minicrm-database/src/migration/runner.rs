use super::scripts::{baseline, BASELINE_VERSION};
use super::types::*;
use crate::error::Result;
use crate::pool::ConnectionPool;
use chrono::Utc;
use parking_lot::RwLock;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use semver::Version;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const VERSION_TABLE: &str = "database_versions";

/// Applies registered migrations and keeps the `database_versions` log.
pub struct DatabaseMigration {
    pool: Arc<ConnectionPool>,
    migrations: RwLock<BTreeMap<Version, Migration>>,
}

impl DatabaseMigration {
    /// Runner with the baseline schema registered.
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        let runner = Self::empty(pool);
        runner.migrations.write().insert(BASELINE_VERSION, baseline());
        runner
    }

    /// Runner with nothing registered.
    pub fn empty(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            migrations: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn register(&self, migration: Migration) -> Result<()> {
        let mut migrations = self.migrations.write();
        if migrations.contains_key(&migration.version) {
            return Err(MigrationError::Duplicate {
                version: migration.version,
            }
            .into());
        }
        debug!(version = %migration.version, "registered migration");
        migrations.insert(migration.version.clone(), migration);
        Ok(())
    }

    /// Highest registered version, if any.
    pub fn latest_version(&self) -> Option<Version> {
        self.migrations.read().keys().next_back().cloned()
    }

    pub fn registered_versions(&self) -> Vec<Version> {
        self.migrations.read().keys().cloned().collect()
    }

    /// Version of the most recently applied migration; `0.0.0` on a database
    /// that has never been migrated.
    pub fn current_version(&self) -> Result<Version> {
        let conn = self.pool.get_connection()?;
        read_current_version(&conn)
    }

    /// Every applied migration, oldest first.
    pub fn history(&self) -> Result<Vec<MigrationRecord>> {
        let conn = self.pool.get_connection()?;
        if !version_table_exists(&conn)? {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(
            "SELECT id, version, created_at, description FROM database_versions ORDER BY id",
        )?;
        let records = stmt.query_map([], |row| {
            let version: String = row.get(1)?;
            Ok(MigrationRecord {
                id: row.get(0)?,
                version: Version::parse(&version).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                })?,
                applied_at: row.get(2)?,
                description: row.get(3)?,
            })
        })?;

        Ok(records.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Migrations that `migrate_to_version(target)` would apply, without
    /// applying them.
    pub fn pending(&self, target: &str) -> Result<Vec<Migration>> {
        let target = parse_version(target)?;
        let current = self.current_version()?;
        self.plan(&current, &target)
    }

    /// Bring the schema to `target`.
    ///
    /// Every registered migration in `(current, target]` runs in ascending
    /// order inside one immediate transaction, each appending its own record.
    /// Any failing statement rolls everything back and leaves the version log
    /// untouched. Asking for the current version is a no-op.
    #[instrument(skip(self))]
    pub fn migrate_to_version(&self, target: &str) -> Result<MigrationReport> {
        let target = parse_version(target)?;
        let mut conn = self.pool.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = read_current_version(&tx)?;
        let plan = self.plan(&current, &target)?;
        if plan.is_empty() {
            debug!(%current, "schema already at target version");
            return Ok(MigrationReport {
                from: current.clone(),
                to: current,
                applied: Vec::new(),
            });
        }

        let _span = minicrm_common_log::spans::migration_span(
            &current.to_string(),
            &target.to_string(),
        )
        .entered();

        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS database_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                version TEXT NOT NULL,
                created_at TEXT NOT NULL,
                description TEXT
            )",
        )?;

        let mut applied = Vec::with_capacity(plan.len());
        for migration in plan {
            for (index, sql) in migration.statements.iter().enumerate() {
                tx.execute_batch(sql).map_err(|source| MigrationError::StatementFailed {
                    version: migration.version.clone(),
                    index,
                    source,
                })?;
            }

            tx.execute(
                "INSERT INTO database_versions (version, created_at, description) VALUES (?1, ?2, ?3)",
                rusqlite::params![migration.version.to_string(), Utc::now(), migration.description],
            )?;
            info!(version = %migration.version, description = %migration.description, "applied migration");
            applied.push(migration.version);
        }

        tx.commit()?;
        info!(from = %current, to = %target, count = applied.len(), "schema migrated");

        Ok(MigrationReport {
            from: current,
            to: target,
            applied,
        })
    }

    fn plan(&self, current: &Version, target: &Version) -> Result<Vec<Migration>> {
        if target == current {
            return Ok(Vec::new());
        }

        if target < current {
            return Err(MigrationError::Downgrade {
                current: current.clone(),
                target: target.clone(),
            }
            .into());
        }

        let migrations = self.migrations.read();
        if !migrations.contains_key(target) {
            return Err(MigrationError::UnknownVersion(target.clone()).into());
        }

        Ok(migrations
            .range((
                std::ops::Bound::Excluded(current),
                std::ops::Bound::Included(target),
            ))
            .map(|(_, m)| m.clone())
            .collect())
    }
}

impl std::fmt::Debug for DatabaseMigration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseMigration")
            .field("registered", &self.registered_versions())
            .finish_non_exhaustive()
    }
}

fn version_table_exists(conn: &Connection) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [VERSION_TABLE],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn read_current_version(conn: &Connection) -> Result<Version> {
    if !version_table_exists(conn)? {
        return Ok(Version::new(0, 0, 0));
    }

    let latest: Option<String> = conn
        .query_row(
            "SELECT version FROM database_versions ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match latest {
        Some(v) => Ok(parse_version(&v)?),
        None => Ok(Version::new(0, 0, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;
    use crate::pool::PoolConfig;
    use crate::sqlite_config::SqliteConfig;
    use minicrm_test_utils::{assert_err, assert_ok, temp_db_path};
    use tempfile::TempDir;

    fn runner() -> (TempDir, Arc<ConnectionPool>, DatabaseMigration) {
        let (dir, path) = temp_db_path("migrations");
        let config = PoolConfig::builder()
            .database_path(path)
            .max_connections(2)
            .sqlite(SqliteConfig::testing())
            .build()
            .unwrap();
        let pool = Arc::new(ConnectionPool::open(&config).unwrap());
        let migration = DatabaseMigration::new(pool.clone());
        (dir, pool, migration)
    }

    fn version_rows(pool: &ConnectionPool) -> i64 {
        let conn = pool.get_connection().unwrap();
        conn.query_row("SELECT COUNT(*) FROM database_versions", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_fresh_database_is_version_zero() {
        let (_dir, _pool, migration) = runner();
        assert_eq!(migration.current_version().unwrap(), Version::new(0, 0, 0));
        assert!(migration.history().unwrap().is_empty());
    }

    #[test]
    fn test_baseline_creates_schema() {
        let (_dir, pool, migration) = runner();

        let report = assert_ok!(migration.migrate_to_version("1.0.0"));
        assert_eq!(report.applied, vec![Version::new(1, 0, 0)]);
        assert_eq!(migration.current_version().unwrap(), Version::new(1, 0, 0));

        let conn = pool.get_connection().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('customers', 'customer_types')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_repeated_migration_is_noop() {
        let (_dir, pool, migration) = runner();

        migration.migrate_to_version("1.0.0").unwrap();
        let second = migration.migrate_to_version("1.0.0").unwrap();

        assert!(second.is_noop());
        assert_eq!(version_rows(&pool), 1);
        assert_eq!(migration.history().unwrap().len(), 1);
    }

    #[test]
    fn test_multi_step_plan_applies_in_order() {
        let (_dir, pool, migration) = runner();
        migration
            .register(
                Migration::new(Version::new(1, 2, 0), "Customer notes")
                    .statement("ALTER TABLE customers ADD COLUMN notes TEXT"),
            )
            .unwrap();
        migration
            .register(
                Migration::new(Version::new(1, 1, 0), "Customer tags")
                    .statement("CREATE TABLE customer_tags (customer_id INTEGER, tag TEXT)"),
            )
            .unwrap();

        let pending = migration.pending("1.2.0").unwrap();
        let versions: Vec<_> = pending.iter().map(|m| m.version.to_string()).collect();
        assert_eq!(versions, vec!["1.0.0", "1.1.0", "1.2.0"]);

        let report = migration.migrate_to_version("1.2.0").unwrap();
        assert_eq!(report.applied.len(), 3);
        assert_eq!(version_rows(&pool), 3);

        let history = migration.history().unwrap();
        assert_eq!(history.last().unwrap().version, Version::new(1, 2, 0));
        assert_eq!(history[1].description.as_deref(), Some("Customer tags"));
    }

    #[test]
    fn test_failed_statement_rolls_back_everything() {
        let (_dir, pool, migration) = runner();
        migration
            .register(
                Migration::new(Version::new(1, 1, 0), "Broken")
                    .statement("CREATE TABLE ok_table (id INTEGER)")
                    .statement("ALTER TABLE missing_table ADD COLUMN x TEXT"),
            )
            .unwrap();

        let err = assert_err!(migration.migrate_to_version("1.1.0"));
        assert!(matches!(
            err,
            DatabaseError::Migration(MigrationError::StatementFailed { index: 1, .. })
        ));

        // the baseline step in the same plan is rolled back too
        assert_eq!(migration.current_version().unwrap(), Version::new(0, 0, 0));
        let conn = pool.get_connection().unwrap();
        let leaked: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name IN ('ok_table', 'customers', 'database_versions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(leaked, 0);
    }

    #[test]
    fn test_unknown_and_downgrade_targets_rejected() {
        let (_dir, _pool, migration) = runner();

        let err = assert_err!(migration.migrate_to_version("2.0.0"));
        assert!(matches!(err, DatabaseError::Migration(MigrationError::UnknownVersion(_))));

        migration.migrate_to_version("1.0.0").unwrap();
        let err = assert_err!(migration.migrate_to_version("0.5.0"));
        assert!(matches!(err, DatabaseError::Migration(MigrationError::Downgrade { .. })));

        let err = assert_err!(migration.migrate_to_version("one"));
        assert!(matches!(err, DatabaseError::Migration(MigrationError::InvalidVersion { .. })));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let (_dir, _pool, migration) = runner();
        let err = assert_err!(migration.register(baseline()));
        assert!(matches!(err, DatabaseError::Migration(MigrationError::Duplicate { .. })));
        assert_eq!(migration.latest_version(), Some(Version::new(1, 0, 0)));
    }
}
