use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The network request failed and no fallback applied.
    #[error("Network error: {0}")]
    Network(String),

    /// Offline and nothing cached for this request.
    #[error("Not cached: {0}")]
    NotCached(String),

    /// The context task is gone.
    #[error("Background cache context is not running")]
    ContextStopped,

    #[error("Install failed: {0}")]
    Install(String),
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::Network(err.to_string())
    }
}
