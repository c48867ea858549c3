use std::net::SocketAddr;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use nous_api::api::create_application;
use nous_api::api::handlers::health::initialize_server_start_time;
use nous_domain::config::OptimizerConfig;
use nous_domain::database::{initialize_database_pool, run_migrations, DatabaseConfig, DatabasePool, MigrationOptions};
use nous_domain::services::spawn_cache_cleanup;

/// The main entry point for the NOUS gateway server
///
/// Loads `.env`, sets up tracing, opens the cache database (falling back
/// to in-memory storage), applies migrations unless `--no-migrations` is
/// given, then serves until Ctrl+C or SIGTERM.
#[tokio::main]
async fn main() -> Result<()> {
    if dotenv().is_err() {
        eprintln!("Warning: .env file not found or couldn't be read. Using environment variables.");
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false)
                .with_ansi(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stdout),
        )
        .with(env_filter)
        .init();

    info!("Starting NOUS AI gateway");

    let skip_migrations = std::env::args().skip(1).any(|arg| arg == "--no-migrations");

    let pool = match DatabaseConfig::from_env().and_then(|config| initialize_database_pool(&config)) {
        Ok(pool) => {
            info!("Database pool initialized: {}", pool.connection_info());
            Some(pool)
        }
        Err(e) => {
            error!("Failed to initialize database pool: {}", e);
            warn!("Continuing with in-memory storage");
            None
        }
    };

    if let Some(pool) = &pool {
        // An in-memory database starts empty, so it always needs its schema
        if skip_migrations && !pool.is_in_memory() {
            info!("Skipping database migrations (--no-migrations)");
        } else {
            apply_migrations(pool);
        }
    }

    let config = OptimizerConfig::from_env();

    initialize_server_start_time();

    let application = create_application(pool, &config).context("Failed to create application")?;
    let cleanup = spawn_cache_cleanup(application.ai_service.clone(), config.cleanup_interval);

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .context("PORT must be a number")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, application.router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    application.batch_queue.close();
    cleanup.abort();

    info!("Server shutdown complete");
    Ok(())
}

/// Apply pending migrations; failures are logged and the server keeps
/// going, since storage errors degrade to in-memory repositories
fn apply_migrations(pool: &DatabasePool) {
    let mut conn = match pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            error!("Could not get a connection for migrations: {}", e);
            return;
        }
    };

    match run_migrations(&mut conn, MigrationOptions::default()) {
        Ok(report) if report.is_success() => {
            info!(
                "Migrations complete: {} applied, {} already present",
                report.applied.len(),
                report.skipped.len()
            );
        }
        Ok(report) => {
            for (name, reason) in &report.failed {
                error!("Migration {} failed: {}", name, reason);
            }
        }
        Err(e) => error!("Failed to run migrations: {}", e),
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down server...");
}
