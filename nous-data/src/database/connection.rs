//! Database connection module for the NOUS AI gateway
//!
//! The gateway keeps its response cache and usage log in a local SQLite
//! file. When the file cannot be opened the pool falls back to an
//! in-memory database so requests keep flowing without persistence.

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;
use tracing::{error, info, warn};

/// Default location of the cache database
pub const DEFAULT_SQLITE_PATH: &str = "data/nous_cache.db";

/// Database error
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// SQLite connection pool error
    #[error("SQLite connection pool error: {0}")]
    SqlitePoolError(#[from] r2d2::Error),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Migration error
    #[error("Database migration error: {0}")]
    MigrationError(String),

    /// Generic database error
    #[error("Database error: {0}")]
    GenericError(String),
}

impl From<String> for DatabaseError {
    fn from(error: String) -> Self {
        DatabaseError::GenericError(error)
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, `None` for an in-memory database
    pub sqlite_path: Option<String>,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: Some(DEFAULT_SQLITE_PATH.to_string()),
            max_connections: 10,
            timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            sqlite_path: None,
            ..Self::default()
        }
    }

    /// Pool checkout timeout; r2d2 rejects a zero duration
    fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    /// Create a new database configuration from environment variables
    pub fn from_env() -> Result<Self, DatabaseError> {
        let sqlite_path = match env::var("DB_SQLITE_PATH") {
            Ok(path) if path == ":memory:" => None,
            Ok(path) if path.trim().is_empty() => {
                return Err(DatabaseError::ConfigError("DB_SQLITE_PATH is empty".to_string()));
            }
            Ok(path) => Some(path),
            Err(_) => {
                info!("No DB_SQLITE_PATH provided, will use default path: {}", DEFAULT_SQLITE_PATH);
                Some(DEFAULT_SQLITE_PATH.to_string())
            }
        };

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(10);

        let timeout_seconds = env::var("DB_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(30);

        info!("Database configuration: max_connections={}, timeout={}s", max_connections, timeout_seconds);

        Ok(DatabaseConfig {
            sqlite_path,
            max_connections,
            timeout_seconds,
        })
    }
}

/// Shared SQLite connection pool
#[derive(Clone)]
pub struct DatabasePool {
    pool: Arc<r2d2::Pool<SqliteConnectionManager>>,
    in_memory: bool,
}

impl fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.pool.state();
        f.debug_struct("DatabasePool")
            .field("in_memory", &self.in_memory)
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .finish()
    }
}

impl DatabasePool {
    /// Check out a connection
    pub fn get(&self) -> Result<PooledConnection<SqliteConnectionManager>, DatabaseError> {
        Ok(self.pool.get()?)
    }

    /// Whether this pool fell back to (or was configured as) an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Describe the current database connection
    pub fn connection_info(&self) -> String {
        let location = match self.get() {
            Ok(conn) => match conn.query_row("PRAGMA database_list", [], |row| row.get::<_, String>(2)) {
                Ok(path) if path.is_empty() || path == ":memory:" => "SQLite in-memory database".to_string(),
                Ok(path) => format!("SQLite database at {}", path),
                Err(_) => "SQLite database (path unknown)".to_string(),
            },
            Err(e) => {
                error!("Failed to get SQLite connection: {}", e);
                return format!("SQLite connection error: {}", e);
            }
        };

        let state = self.pool.state();
        format!(
            "{} (connections: active={}, idle={})",
            location, state.connections, state.idle_connections
        )
    }

    /// Run a trivial query to verify the database answers
    pub fn ping(&self) -> Result<(), DatabaseError> {
        let conn = self.get()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

/// Initialize the database connection pool
pub fn initialize_database_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    match config.sqlite_path.as_deref() {
        Some(path) => initialize_sqlite_pool(path, config),
        None => initialize_in_memory_sqlite_pool(config),
    }
}

/// Initialize SQLite connection pool
fn initialize_sqlite_pool(sqlite_path: &str, config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!("Initializing SQLite database at: {}", sqlite_path);

    // Create parent directory if it doesn't exist
    if let Some(parent) = Path::new(sqlite_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating parent directory: {:?}", parent);
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Failed to create directory: {}, falling back to in-memory database", e);
                return initialize_in_memory_sqlite_pool(config);
            }
        }
    }

    let manager = SqliteConnectionManager::file(sqlite_path)
        .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
        .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));

    match r2d2::Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(config.connection_timeout())
        .build(manager)
    {
        Ok(pool) => match pool.get() {
            Ok(_) => {
                info!("SQLite connection pool created successfully");
                Ok(DatabasePool {
                    pool: Arc::new(pool),
                    in_memory: false,
                })
            }
            Err(e) => {
                error!("Failed to connect to SQLite database: {}", e);
                warn!("Falling back to in-memory SQLite database");
                initialize_in_memory_sqlite_pool(config)
            }
        },
        Err(e) => {
            error!("Failed to create SQLite connection pool: {}", e);
            warn!("Falling back to in-memory SQLite database");
            initialize_in_memory_sqlite_pool(config)
        }
    }
}

/// Initialize an in-memory SQLite database
///
/// Every in-memory connection is a separate database, so the pool holds
/// exactly one connection.
fn initialize_in_memory_sqlite_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!("Initializing in-memory SQLite database");

    let manager = SqliteConnectionManager::memory();
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .connection_timeout(config.connection_timeout())
        .build(manager)?;

    info!("In-memory SQLite database initialized successfully");
    Ok(DatabasePool {
        pool: Arc::new(pool),
        in_memory: true,
    })
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.sqlite_path.as_deref(), Some(DEFAULT_SQLITE_PATH));
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_in_memory_pool_is_shared_between_checkouts() {
        let pool = initialize_database_pool(&DatabaseConfig::in_memory()).unwrap();
        assert!(pool.is_in_memory());

        {
            let conn = pool.get().unwrap();
            conn.execute_batch("CREATE TABLE scratch (id INTEGER); INSERT INTO scratch VALUES (7);").unwrap();
        }

        let conn = pool.get().unwrap();
        let value: i64 = conn.query_row("SELECT id FROM scratch", [], |row| row.get(0)).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_ping_and_connection_info() {
        let pool = initialize_database_pool(&DatabaseConfig::in_memory()).unwrap();
        assert!(pool.ping().is_ok());
        assert!(pool.connection_info().contains("in-memory"));
    }

    #[test]
    fn test_zero_timeout_still_builds_a_pool() {
        let config = DatabaseConfig {
            timeout_seconds: 0,
            ..DatabaseConfig::in_memory()
        };
        assert_eq!(config.connection_timeout(), Duration::from_secs(1));

        let pool = initialize_database_pool(&config).unwrap();
        assert!(pool.ping().is_ok());
    }
}
