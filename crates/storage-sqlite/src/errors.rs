//! Storage errors and their mapping into the core taxonomy.

use pocketledger_core::errors::{DatabaseError, Error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Query(e) => Error::Database(DatabaseError::QueryFailed(e.to_string())),
            StorageError::Connection(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::Pool(e) => Error::Database(DatabaseError::ConnectionFailed(e.to_string())),
            StorageError::Migration(msg) => Error::Database(DatabaseError::MigrationFailed(msg)),
            StorageError::InvalidValue(msg) => Error::Database(DatabaseError::Internal(msg)),
            StorageError::Io(e) => Error::StorageUnavailable(e.to_string()),
        }
    }
}
