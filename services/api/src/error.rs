//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its
//! translation to transport responses. Handlers return the typed error;
//! nothing propagates to the client as an unhandled fault.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use grant_assistant_core::ports::PortError;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    /// Maps the error taxonomy to the HTTP status the adapters promise:
    /// not-found 404, auth 401/403, validation 400, throttling 429,
    /// upstream storage 502, everything else 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Port(PortError::Unauthorized) => StatusCode::UNAUTHORIZED,
            ApiError::Port(PortError::Forbidden) => StatusCode::FORBIDDEN,
            ApiError::Port(PortError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Port(PortError::Throttled) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Port(PortError::Gateway(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The client-facing message. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Port(PortError::NotFound(msg)) => msg.clone(),
            ApiError::Port(PortError::Unauthorized) => "User not authenticated".to_string(),
            ApiError::Port(PortError::Forbidden) => {
                "User is not authorized to perform this action".to_string()
            }
            ApiError::Port(PortError::InvalidInput(msg)) => msg.clone(),
            ApiError::Port(PortError::Throttled) => "Request limit exceeded".to_string(),
            ApiError::Port(PortError::Gateway(_)) => {
                "Failed to reach the storage backend".to_string()
            }
            _ => "An unexpected error occurred".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.public_message() }))).into_response()
    }
}
