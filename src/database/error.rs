use thiserror::Error;

use crate::filter::error::FilterError;

/// Errors raised by the storage mapper and everything built on it
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("data is not found")]
    NotFound,

    /// Unique-key conflict reported by the database
    #[error("data already exists")]
    AlreadyExists,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("query preparation failed: {0}")]
    Query(String),

    /// Programmer error: the mapper was called in a way its record type cannot support
    #[error("invalid storage usage: {0}")]
    Misuse(String),

    #[error("{path}: {source}")]
    Driver {
        path: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StorageError {
    /// Prefix the call path of a driver error, innermost call last.
    pub fn with_path(self, segment: &str) -> Self {
        match self {
            StorageError::Driver { path, source } => StorageError::Driver {
                path: format!(".{}{}", segment, path),
                source,
            },
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound)
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StorageError::AlreadyExists,
            source => StorageError::Driver {
                path: String::new(),
                source,
            },
        }
    }
}

impl From<FilterError> for StorageError {
    fn from(err: FilterError) -> Self {
        StorageError::Validation(err.to_string())
    }
}
