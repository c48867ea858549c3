// NOUS Data
// This crate owns the SQLite response cache and the provider usage log

// Database connection management
pub mod database;

// Repository implementations for data access
pub mod repository;

// Data storage models
pub mod models;
