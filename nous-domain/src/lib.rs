// NOUS Domain
// This crate contains the cost-optimized AI routing logic for the NOUS assistant

// Configuration read from the environment
pub mod config;

// Domain entities
pub mod entities;

// External AI providers and their static cost table
pub mod providers;

// Services that implement business logic
pub mod services;

// Health checks and system status
pub mod health;

// Re-export the database module from nous-data for convenience
pub use nous_data::database;

// Testing utilities - only available with mock feature
#[cfg(any(test, feature = "mock"))]
pub mod testing;
