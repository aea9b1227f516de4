//! Test error types.

use thiserror::Error;

/// Errors raised while building test inputs.
#[derive(Debug, Error)]
pub enum TestError {
    /// Request building failed.
    #[error("Request build error: {0}")]
    RequestBuild(String),

    /// A header name or value is invalid.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
