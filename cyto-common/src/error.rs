//! Common error types for the cytometry workspace

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Common result type for store and configuration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the pipeline and dashboard
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error that is not a constraint violation
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Constraint violation during a write (bad enum value, duplicate key,
    /// dangling foreign key, missing required value)
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let Some(db_err) = err.as_database_error() else {
            return Self::Database(err);
        };

        let is_constraint = matches!(
            db_err.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        ) || db_err.message().contains("constraint failed");

        if is_constraint {
            Self::Integrity(db_err.message().to_string())
        } else {
            Self::Database(err)
        }
    }
}

impl Error {
    /// True for constraint violations raised by the store
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}
