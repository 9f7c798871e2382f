use core_library::LibraryError;
use provider_feed_api::FeedApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Upstream unreachable or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-2xx status
    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// Upstream body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Local store failure
    #[error("Store error: {0}")]
    Library(#[from] LibraryError),

    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Network and server failures; the caller can show a transient message
    /// and try again later.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::Server { .. })
    }
}

impl From<FeedApiError> for SyncError {
    fn from(error: FeedApiError) -> Self {
        match error {
            FeedApiError::Network(msg) => SyncError::Network(msg),
            FeedApiError::Api {
                status_code,
                message,
            } => SyncError::Server {
                status: status_code,
                message,
            },
            FeedApiError::ParseError(msg) => SyncError::Decode(msg),
            FeedApiError::InvalidRequest(msg) => SyncError::Config(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
