//! Error types shared by the services

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Errors raised while talking to PostgreSQL
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// Stored row does not hold a valid domain value
    #[error("Corrupt {table} row {id}: {reason}")]
    Corrupt {
        table: &'static str,
        id: String,
        reason: String,
    },
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised while loading [`crate::settings::Settings`]
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
