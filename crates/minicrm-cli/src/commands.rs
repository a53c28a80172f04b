//! Subcommand implementations.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use minicrm_common_config::MiniCrmConfig;
use minicrm_database::{DatabaseConfig, EnhancedDatabaseManager, SqliteConfigQuery};
use tracing::info;

use crate::cli::Command;
use crate::Exit;

pub fn run(command: &Command, config: &MiniCrmConfig, quiet: bool) -> anyhow::Result<Exit> {
    let db = open(config)?;
    let out = Output { quiet };

    let exit = match command {
        Command::Init => init(&db, &out)?,
        Command::Migrate { to } => migrate(&db, to.as_deref(), &out)?,
        Command::Status => status(&db, &out)?,
        Command::Backup { path } => backup(&db, config, path.as_deref(), &out)?,
        Command::Check => check(&db, &out)?,
    };

    db.close();
    Ok(exit)
}

fn open(config: &MiniCrmConfig) -> anyhow::Result<EnhancedDatabaseManager> {
    let db_config = DatabaseConfig::from_settings(&config.database)
        .context("invalid database settings")?;
    EnhancedDatabaseManager::new(db_config).with_context(|| {
        format!("failed to open database {}", config.database.db_path.display())
    })
}

struct Output {
    quiet: bool,
}

impl Output {
    fn line(&self, text: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", text.as_ref());
        }
    }
}

fn init(db: &EnhancedDatabaseManager, out: &Output) -> anyhow::Result<Exit> {
    db.initialize_database()?;
    let version = db.get_migration_manager().current_version()?;
    out.line(format!("database initialized at version {}", version));
    Ok(Exit::Success)
}

fn migrate(db: &EnhancedDatabaseManager, to: Option<&str>, out: &Output) -> anyhow::Result<Exit> {
    let migrations = db.get_migration_manager();
    let target = match to {
        Some(target) => target.to_string(),
        None => match migrations.latest_version() {
            Some(latest) => latest.to_string(),
            None => bail!("no migrations registered"),
        },
    };

    let report = migrations.migrate_to_version(&target)?;
    if report.is_noop() {
        out.line(format!("already at version {}", report.to));
    } else {
        for version in &report.applied {
            out.line(format!("applied {}", version));
        }
        out.line(format!("migrated {} -> {}", report.from, report.to));
    }
    Ok(Exit::Success)
}

fn status(db: &EnhancedDatabaseManager, out: &Output) -> anyhow::Result<Exit> {
    let migrations = db.get_migration_manager();
    out.line(format!("current version: {}", migrations.current_version()?));

    let history = migrations.history()?;
    if history.is_empty() {
        out.line("history: none");
    } else {
        out.line("history:");
        for record in history {
            out.line(format!(
                "  {:<10} {}  {}",
                record.version,
                record.applied_at.format("%Y-%m-%d %H:%M:%S"),
                record.description.unwrap_or_default()
            ));
        }
    }

    if let Some(latest) = migrations.latest_version() {
        let pending = migrations
            .pending(&latest.to_string())
            .with_context(|| format!("cannot list migrations pending up to {}", latest))?;
        if pending.is_empty() {
            out.line("pending: none");
        } else {
            out.line("pending:");
            for migration in pending {
                out.line(format!("  {:<10} {}", migration.version, migration.description));
            }
        }
    }

    let stats = db.pool_stats();
    out.line(format!(
        "pool: {} open, {} idle, max {}",
        stats.open, stats.idle, stats.max_connections
    ));
    Ok(Exit::Success)
}

fn backup(
    db: &EnhancedDatabaseManager,
    config: &MiniCrmConfig,
    path: Option<&Path>,
    out: &Output,
) -> anyhow::Result<Exit> {
    let target = match path {
        Some(path) => path.to_path_buf(),
        None => default_backup_path(config)?,
    };

    if db.backup_database(&target) {
        info!(path = %target.display(), "backup written");
        out.line(format!("backup written to {}", target.display()));
        Ok(Exit::Success)
    } else {
        eprintln!("backup to {} failed", target.display());
        Ok(Exit::CheckFailed)
    }
}

fn default_backup_path(config: &MiniCrmConfig) -> anyhow::Result<PathBuf> {
    let Some(dir) = &config.database.backup_dir else {
        bail!("no backup path given and database.backup_dir is not configured");
    };
    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    Ok(dir.join(format!("minicrm-{}.db", stamp)))
}

fn check(db: &EnhancedDatabaseManager, out: &Output) -> anyhow::Result<Exit> {
    let mut healthy = true;

    match db.health_check() {
        Ok(()) => out.line("connection: ok"),
        Err(e) => {
            healthy = false;
            eprintln!("connection: {}", e);
        }
    }

    let conn = db.get_connection()?;
    let problems = SqliteConfigQuery::integrity_check(&conn)?;
    if problems == ["ok"] {
        out.line("integrity: ok");
    } else {
        healthy = false;
        for problem in &problems {
            eprintln!("integrity: {}", problem);
        }
    }

    let size = SqliteConfigQuery::database_size(&conn)?;
    out.line(format!(
        "size: {} bytes ({:.1}% free pages)",
        size.total_bytes(),
        size.fragmentation_ratio() * 100.0
    ));
    out.line(format!("journal mode: {}", SqliteConfigQuery::journal_mode(&conn)?));
    drop(conn);

    let stats = db.pool_stats();
    out.line(format!(
        "pool: {}/{} open, {:.0}% in use",
        stats.open,
        stats.max_connections,
        stats.utilization() * 100.0
    ));

    Ok(if healthy { Exit::Success } else { Exit::CheckFailed })
}
