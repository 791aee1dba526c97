//! Persistence engine error types.
//!
//! Everything the SQLite layer can fail with is defined here; the repository
//! translates the constraint failures into domain errors.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// the main error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// error from the underlying SQLite library
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// a UNIQUE or PRIMARY KEY constraint rejected a write
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// metadata JSON could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// a stored timestamp is not valid RFC 3339
    #[error("invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// a row holds a value the model cannot represent
    #[error("corrupted row in {table} ({id}): {reason}")]
    CorruptedRow {
        table: &'static str,
        id: String,
        reason: String,
    },

    /// the database directory could not be created
    #[error("cannot prepare database path {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Classify a SQLite error, turning constraint failures on unique keys
    /// into [`StoreError::UniqueViolation`].
    pub(crate) fn from_write(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == ErrorCode::ConstraintViolation
                    && matches!(
                        code.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    ) =>
            {
                StoreError::UniqueViolation(message.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => StoreError::Sqlite(err),
        }
    }

    /// check if this error is a unique-key conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }

    /// check if this error names the given `table.column` constraint
    pub(crate) fn violates(&self, column: &str) -> bool {
        matches!(self, StoreError::UniqueViolation(message) if message.contains(column))
    }

    /// check if this error is recoverable by retry
    pub fn is_retriable(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(code, _)) => {
                matches!(code.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            _ => false,
        }
    }
}

/// result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
