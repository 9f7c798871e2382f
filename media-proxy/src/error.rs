//! Proxy error type and its HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing {0} parameter")]
    MissingParameter(&'static str),

    #[error("Invalid cache file name: {0}")]
    InvalidFileName(String),

    #[error("Image not found in cache")]
    NotCached,

    /// Fetching a media URL failed or returned a non-2xx status
    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// The upstream API could not be reached. `context` is the client-facing
    /// error label, e.g. "Failed to fetch feed".
    #[error("{context}: {message}")]
    Upstream {
        context: &'static str,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    pub fn upstream(context: &'static str, error: impl std::fmt::Display) -> Self {
        ProxyError::Upstream {
            context,
            message: error.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingParameter(_) | ProxyError::InvalidFileName(_) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::NotCached => StatusCode::NOT_FOUND,
            ProxyError::Config(_)
            | ProxyError::Download { .. }
            | ProxyError::Upstream { .. }
            | ProxyError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = match &self {
            ProxyError::MissingParameter(_) | ProxyError::NotCached => {
                json!({ "error": self.to_string() })
            }
            ProxyError::InvalidFileName(_) => json!({ "error": "Invalid cache file name" }),
            ProxyError::Upstream { context, message } => {
                json!({ "error": context, "message": message })
            }
            ProxyError::Download { message, .. } => {
                json!({ "error": "Failed to fetch image", "message": message })
            }
            ProxyError::Config(_) | ProxyError::Io(_) => {
                json!({ "error": "Internal server error", "message": self.to_string() })
            }
        };

        (status, Json(body)).into_response()
    }
}
