use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nous_domain::database::{
    initialize_database_pool, pending_migrations, run_migrations, DatabaseConfig, MigrationOptions,
};

const USAGE: &str = "Usage: nous_migrate [OPTIONS]

Apply pending schema migrations to the NOUS cache database.

Options:
  --dry-run          List pending migrations without executing them
  --ignore-errors    Continue past a failing migration
  --debug            Enable debug logging
  --db <path>        Database file (default: DB_SQLITE_PATH or data/nous_cache.db)
  -h, --help         Print this help";

#[derive(Debug, Default)]
struct Args {
    dry_run: bool,
    ignore_errors: bool,
    debug: bool,
    db_path: Option<String>,
    help: bool,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dry-run" => parsed.dry_run = true,
            "--ignore-errors" => parsed.ignore_errors = true,
            "--debug" => parsed.debug = true,
            "--db" => {
                let path = args.next().context("--db requires a path")?;
                parsed.db_path = Some(path);
            }
            "-h" | "--help" => parsed.help = true,
            other => bail!("Unknown argument: {}\n\n{}", other, USAGE),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let _ = dotenv();

    let default_level = if args.debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter)
        .init();

    let mut config = DatabaseConfig::from_env().context("Invalid database configuration")?;
    if let Some(path) = args.db_path {
        config.sqlite_path = Some(path);
    }
    let requested_file = config.sqlite_path.is_some();

    let pool = initialize_database_pool(&config).context("Failed to open database")?;
    if requested_file && pool.is_in_memory() {
        bail!("Could not open database file, refusing to migrate an in-memory fallback");
    }
    info!("Migrating {}", pool.connection_info());

    let mut conn = pool.get().context("Failed to get a database connection")?;

    if args.dry_run {
        let pending = pending_migrations(&conn).context("Failed to read migration ledger")?;
        if pending.is_empty() {
            println!("No pending migrations");
        }
        for migration in pending {
            println!("pending: {:03}_{}", migration.version, migration.name);
        }
        return Ok(());
    }

    let report = run_migrations(
        &mut conn,
        MigrationOptions {
            dry_run: false,
            ignore_errors: args.ignore_errors,
        },
    )
    .context("Migration failed")?;

    for name in &report.applied {
        println!("applied: {}", name);
    }
    for name in &report.skipped {
        println!("already applied: {}", name);
    }
    for (name, reason) in &report.failed {
        warn!("Migration {} failed: {}", name, reason);
        println!("failed: {} ({})", name, reason);
    }

    info!(
        "Done: {} applied, {} skipped, {} failed",
        report.applied.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(())
}
