// Database modules
pub mod connection;
pub mod migrations;

// Re-export database connection types and functions
pub use connection::*;
pub use migrations::{MigrationOptions, MigrationReport, run_migrations, pending_migrations, MIGRATIONS};
