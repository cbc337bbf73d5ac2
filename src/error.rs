//! Error types for the dbkit crate.

use crate::database::DatabaseError;
use thiserror::Error;

/// Result type alias for dbkit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Database error (connection, query, transaction)
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration loading or deserialization error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the underlying cause is an unreachable or missing database
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Database(e) if e.is_connection_error())
    }
}
