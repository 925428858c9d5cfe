//! Custom error types for the common library
//!
//! This module defines the error types shared by both services: one for the
//! relational metadata store and one for the blob store.

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
    #[error("Duplicate value: {0}")]
    UniqueViolation(String),

    /// A foreign key pointed at a row that does not exist
    #[error("Referenced row does not exist: {0}")]
    MissingReference(String),
}

impl DatabaseError {
    /// Classify a query error, surfacing constraint violations as their own variants
    pub fn from_query(err: SqlxError) -> Self {
        if let SqlxError::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    return DatabaseError::UniqueViolation(
                        db_err.constraint().unwrap_or("unique").to_string(),
                    );
                }
                Some("23503") => {
                    return DatabaseError::MissingReference(
                        db_err.constraint().unwrap_or("foreign key").to_string(),
                    );
                }
                _ => {}
            }
        }
        DatabaseError::Query(err)
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised by blob store backends
#[derive(Error, Debug)]
pub enum StorageError {
    /// No object is stored under the key
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// The key is empty, absolute or escapes the store root
    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    /// Storage configuration error
    #[error("Storage configuration error: {0}")]
    Configuration(String),

    /// Error reported by the remote object storage service
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Local filesystem error
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result with StorageError
pub type StorageResult<T> = Result<T, StorageError>;
