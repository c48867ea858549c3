// Versioned schema migrations for the SQLite cache database

mod sqlite;
pub use sqlite::{pending_migrations, run_migrations, Migration, MigrationOptions, MigrationReport, MIGRATIONS};
