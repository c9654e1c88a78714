//! Error types for the remote store client.

use pocketledger_core::errors::{Error, ValidationError};
use thiserror::Error;

/// Result type alias for remote store calls.
pub type Result<T> = std::result::Result<T, RemoteStoreError>;

#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// Transport failure: connect, timeout, or a body that never arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success status from the remote store.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl RemoteStoreError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the request never got an answer from the server.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(e) if !e.is_decode())
    }
}

impl From<RemoteStoreError> for Error {
    fn from(err: RemoteStoreError) -> Self {
        match err {
            e if e.is_transport() => Error::network(e.to_string()),
            RemoteStoreError::Api { status, message } => Error::rejected(Some(status), message),
            RemoteStoreError::InvalidRequest(msg) => {
                Error::Validation(ValidationError::InvalidInput(msg))
            }
            RemoteStoreError::Auth(msg) => Error::rejected(Some(401), msg),
            other => Error::rejected(other.status_code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketledger_core::errors::RetryClass;

    #[test]
    fn api_errors_become_remote_rejections() {
        let err: Error = RemoteStoreError::api(409, "duplicate key").into();
        match err {
            Error::RemoteRejected { status, message } => {
                assert_eq!(status, Some(409));
                assert_eq!(message, "duplicate key");
            }
            other => panic!("unexpected {:?}", other),
        }
        let auth: Error = RemoteStoreError::auth("missing key").into();
        assert!(!auth.is_network());
        assert_eq!(auth.retry_class(), RetryClass::ReauthRequired);
        let unavailable: Error = RemoteStoreError::api(503, "down").into();
        assert_eq!(unavailable.retry_class(), RetryClass::Retryable);
    }
}
