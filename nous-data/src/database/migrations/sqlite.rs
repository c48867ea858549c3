use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, info, warn};

use crate::database::DatabaseError;
use crate::models::format_timestamp;

/// A single schema change, applied at most once
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Monotonic version number
    pub version: i64,
    /// Short human-readable name
    pub name: &'static str,
    /// SQL executed as one batch
    pub sql: &'static str,
}

/// All schema migrations, in application order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_ai_response_cache",
        sql: "CREATE TABLE IF NOT EXISTS ai_response_cache (
                prompt_hash TEXT PRIMARY KEY,
                prompt TEXT NOT NULL,
                response TEXT NOT NULL,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                complexity TEXT NOT NULL,
                cost REAL NOT NULL DEFAULT 0,
                hit_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_accessed TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ai_response_cache_created_at
            ON ai_response_cache (created_at);",
    },
    Migration {
        version: 2,
        name: "create_ai_usage_log",
        sql: "CREATE TABLE IF NOT EXISTS ai_usage_log (
                id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                model TEXT,
                complexity TEXT NOT NULL,
                prompt_hash TEXT NOT NULL,
                tokens INTEGER NOT NULL DEFAULT 0,
                cost REAL NOT NULL DEFAULT 0,
                saved_cost REAL NOT NULL DEFAULT 0,
                cache_hit INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ai_usage_log_provider_created_at
            ON ai_usage_log (provider, created_at);",
    },
];

/// Options controlling a migration run
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationOptions {
    /// Report pending migrations without executing them
    pub dry_run: bool,
    /// Keep going when a migration fails
    pub ignore_errors: bool,
}

/// Outcome of a migration run
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Migrations executed in this run (or that would run, in dry-run mode)
    pub applied: Vec<String>,
    /// Migrations already recorded in the ledger
    pub skipped: Vec<String>,
    /// Migrations that failed, with the error text
    pub failed: Vec<(String, String)>,
}

impl MigrationReport {
    /// Whether every migration succeeded
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

fn create_ledger(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn is_applied(conn: &Connection, version: i64) -> Result<bool, DatabaseError> {
    let found = conn
        .query_row(
            "SELECT version FROM schema_migrations WHERE version = ?1",
            params![version],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// List migrations not yet recorded in the ledger
pub fn pending_migrations(conn: &Connection) -> Result<Vec<Migration>, DatabaseError> {
    create_ledger(conn)?;

    let mut pending = Vec::new();
    for migration in MIGRATIONS {
        if !is_applied(conn, migration.version)? {
            pending.push(*migration);
        }
    }
    Ok(pending)
}

fn apply(conn: &mut Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![migration.version, migration.name, format_timestamp(&Utc::now())],
    )?;
    tx.commit()?;
    Ok(())
}

/// Run SQLite migrations
pub fn run_migrations(conn: &mut Connection, options: MigrationOptions) -> Result<MigrationReport, DatabaseError> {
    info!("Running SQLite migrations (dry_run={}, ignore_errors={})", options.dry_run, options.ignore_errors);

    create_ledger(conn)?;
    let mut report = MigrationReport::default();

    for migration in MIGRATIONS {
        let label = format!("{:03}_{}", migration.version, migration.name);

        if is_applied(conn, migration.version)? {
            debug!("Migration {} already applied", label);
            report.skipped.push(label);
            continue;
        }

        if options.dry_run {
            info!("Would apply migration {}", label);
            report.applied.push(label);
            continue;
        }

        info!("Applying migration {}", label);
        match apply(conn, migration) {
            Ok(()) => report.applied.push(label),
            Err(e) if options.ignore_errors => {
                warn!("Migration {} failed, continuing: {}", label, e);
                report.failed.push((label, e.to_string()));
            }
            Err(e) => {
                error!("Migration {} failed: {}", label, e);
                return Err(DatabaseError::MigrationError(format!("{}: {}", label, e)));
            }
        }
    }

    info!(
        "SQLite migrations finished: applied={}, skipped={}, failed={}",
        report.applied.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_migrations_create_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = run_migrations(&mut conn, MigrationOptions::default()).unwrap();

        assert_eq!(report.applied.len(), MIGRATIONS.len());
        assert!(report.is_success());
        assert!(table_exists(&conn, "ai_response_cache"));
        assert!(table_exists(&conn, "ai_usage_log"));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn, MigrationOptions::default()).unwrap();

        let second = run_migrations(&mut conn, MigrationOptions::default()).unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(second.skipped.len(), MIGRATIONS.len());
        assert!(pending_migrations(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_dry_run_executes_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();
        let options = MigrationOptions { dry_run: true, ignore_errors: false };

        let report = run_migrations(&mut conn, options).unwrap();
        assert_eq!(report.applied.len(), MIGRATIONS.len());
        assert!(!table_exists(&conn, "ai_response_cache"));
        assert_eq!(pending_migrations(&conn).unwrap().len(), MIGRATIONS.len());
    }

    #[test]
    fn test_failed_migration_is_reported_when_ignoring_errors() {
        let mut conn = Connection::open_in_memory().unwrap();
        // A view squatting on the table name makes the first migration fail
        conn.execute_batch("CREATE VIEW ai_response_cache AS SELECT 1 AS x;").unwrap();

        let options = MigrationOptions { dry_run: false, ignore_errors: true };
        let report = run_migrations(&mut conn, options).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.contains("create_ai_response_cache"));
        assert!(report.applied.iter().any(|m| m.contains("create_ai_usage_log")));

        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE VIEW ai_response_cache AS SELECT 1 AS x;").unwrap();
        assert!(run_migrations(&mut conn, MigrationOptions::default()).is_err());
    }
}
