use thiserror::Error;

/// Errors raised by external collaborators: generation, execution, the
/// reasoning model, the metadata store and the mirror.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("Request timed out")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CollaboratorError {
    /// Whether retrying the same call may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::Unavailable(_) | Self::Network(_)
        )
    }

    /// Map an HTTP status to an error
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::Unauthorized(body),
            404 => Self::NotFound(body),
            408 => Self::Timeout,
            429 => Self::RateLimited,
            500..=599 => Self::Unavailable(format!("{status}: {body}")),
            _ => Self::Rejected(format!("{status}: {body}")),
        }
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
