//! Custom error types for the common library
//!
//! This module defines the storage error type shared by every repository.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A row the write depends on does not exist
    #[error("Referenced row is missing: {0}")]
    MissingReference(String),

    /// Stored data does not satisfy an invariant the caller relies on
    #[error("Data integrity violation: {0}")]
    Integrity(String),
}

impl DatabaseError {
    /// Classify a query error, separating unique-constraint violations from
    /// every other failure.
    pub fn from_query(error: SqlxError) -> Self {
        if let SqlxError::Database(db) = &error {
            if db.is_unique_violation() {
                let constraint = db.constraint().unwrap_or("unknown").to_string();
                return DatabaseError::UniqueViolation(constraint);
            }
        }
        DatabaseError::Query(error)
    }
}

impl From<SqlxError> for DatabaseError {
    fn from(error: SqlxError) -> Self {
        DatabaseError::from_query(error)
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
