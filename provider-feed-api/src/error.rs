//! Error types for the feed API provider

use thiserror::Error;

/// Feed API errors
#[derive(Error, Debug)]
pub enum FeedApiError {
    /// The request never produced a response (connect, TLS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API request returned a non-2xx status
    #[error("Feed API error (status {status_code}): {message}")]
    Api { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for feed API operations
pub type Result<T> = std::result::Result<T, FeedApiError>;

impl From<bridge_traits::error::BridgeError> for FeedApiError {
    fn from(error: bridge_traits::error::BridgeError) -> Self {
        use bridge_traits::error::BridgeError;

        match error {
            BridgeError::Timeout(duration) => {
                FeedApiError::Network(format!("request timed out after {:?}", duration))
            }
            BridgeError::OperationFailed(msg) | BridgeError::NotAvailable(msg) => {
                FeedApiError::Network(msg)
            }
            BridgeError::Io(e) => FeedApiError::Network(e.to_string()),
        }
    }
}

impl FeedApiError {
    /// Whether the failure happened before any response arrived
    pub fn is_network(&self) -> bool {
        matches!(self, FeedApiError::Network(_))
    }
}
