//! Error types shared across the PocketLedger crates.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// How worthwhile it is to try a failed remote call again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Top-level error taxonomy.
///
/// Creation, replay and edits react to these differently: a
/// `NetworkUnavailable` creation is queued, a `RemoteRejected` creation is
/// rolled back, and both are only logged for edits and deletes.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote call could not be attempted or did not complete.
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The remote store answered with an application-level error.
    #[error("Remote store rejected request: {message}")]
    RemoteRejected {
        status: Option<u16>,
        message: String,
    },

    /// The durable local queue could not be opened or written.
    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A replayed entry has no tentative counterpart in the visible list.
    #[error("No tentative transaction matches queued entry {0}")]
    ReplayConflict(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Notification error: {0}")]
    Notification(String),
}

impl Error {
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkUnavailable(message.into())
    }

    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteRejected {
            status,
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable(message.into())
    }

    /// True when the failure came from the network layer rather than the store.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_))
    }

    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::NetworkUnavailable(_) | Self::StorageUnavailable(_) => RetryClass::Retryable,
            Self::RemoteRejected { status, .. } => match status {
                Some(401) | Some(403) => RetryClass::ReauthRequired,
                Some(408) | Some(409) | Some(423) | Some(425) | Some(429) => {
                    RetryClass::Retryable
                }
                Some(500..=599) | None => RetryClass::Retryable,
                Some(_) => RetryClass::Permanent,
            },
            Self::Database(_) => RetryClass::Retryable,
            Self::ReplayConflict(_)
            | Self::Validation(_)
            | Self::Json(_)
            | Self::Notification(_) => RetryClass::Permanent,
        }
    }
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing field: {0}")]
    MissingField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_classified() {
        assert!(Error::network("offline").is_network());
        assert!(!Error::rejected(Some(400), "bad row").is_network());
        assert!(!Error::storage("disk full").is_network());
    }

    #[test]
    fn retry_class_follows_status() {
        assert_eq!(
            Error::rejected(Some(401), "JWT expired").retry_class(),
            RetryClass::ReauthRequired
        );
        assert_eq!(
            Error::rejected(Some(503), "down").retry_class(),
            RetryClass::Retryable
        );
        assert_eq!(
            Error::rejected(Some(400), "bad column").retry_class(),
            RetryClass::Permanent
        );
        assert_eq!(Error::network("offline").retry_class(), RetryClass::Retryable);
    }

    #[test]
    fn rejected_error_message_includes_detail() {
        let err = Error::rejected(Some(409), "duplicate key");
        assert_eq!(err.to_string(), "Remote store rejected request: duplicate key");
    }
}
