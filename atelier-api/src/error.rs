//! Error types for the persistence client

use thiserror::Error;

/// Persistence client error
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },
}

impl ApiError {
    /// Whether this error is the benign "record not found" case.
    ///
    /// Delete steps treat it as already-satisfied rather than as a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Normalize an error response into a structured variant.
    ///
    /// The service does not reserve a status code for missing records; some
    /// paths answer 200 with an error body. The "not found" sentinel is
    /// therefore matched by substring in addition to the 404 status.
    pub(crate) fn from_status_body(status: u16, message: String) -> Self {
        if status == 404 || message.to_ascii_lowercase().contains("not found") {
            ApiError::NotFound(message)
        } else {
            ApiError::Server { status, message }
        }
    }
}

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, ApiError>;
