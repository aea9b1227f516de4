//! Error types for gateway collaborators.
//!
//! Per-request code paths never surface these to callers. Each stage maps a
//! [`GatewayError`] to its own fail-open or fail-closed outcome; the error
//! only survives as a log field and a metric label.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure of an external collaborator or of its input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The collaborator did not answer within its time budget.
    #[error("{collaborator} timed out after {}ms", elapsed.as_millis())]
    Timeout {
        /// Collaborator name (`rate_limiter`, `csrf_validator`, ...).
        collaborator: &'static str,
        /// The budget that elapsed.
        elapsed: Duration,
    },

    /// The collaborator reported an error (store unreachable, etc.).
    #[error("{collaborator} unavailable: {message}")]
    Unavailable {
        /// Collaborator name.
        collaborator: &'static str,
        /// Human-readable cause.
        message: String,
    },

    /// Request input could not be interpreted (bad cookie, bad claims).
    #[error("malformed {what}: {message}")]
    Malformed {
        /// What was being parsed.
        what: &'static str,
        /// Human-readable cause.
        message: String,
    },
}

impl GatewayError {
    /// Creates a timeout error.
    pub const fn timeout(collaborator: &'static str, elapsed: Duration) -> Self {
        Self::Timeout {
            collaborator,
            elapsed,
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator,
            message: message.into(),
        }
    }

    /// Creates a malformed-input error.
    pub fn malformed(what: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            message: message.into(),
        }
    }

    /// Returns true for [`GatewayError::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Short label for metrics (`timeout`, `unavailable`, `malformed`).
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Unavailable { .. } => "unavailable",
            Self::Malformed { .. } => "malformed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = GatewayError::timeout("rate_limiter", Duration::from_millis(250));
        assert_eq!(err.to_string(), "rate_limiter timed out after 250ms");
        assert!(err.is_timeout());
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_unavailable_display() {
        let err = GatewayError::unavailable("session_verifier", "connection refused");
        assert!(err.to_string().contains("connection refused"));
        assert!(!err.is_timeout());
        assert_eq!(err.kind(), "unavailable");
    }

    #[test]
    fn test_malformed_kind() {
        let err = GatewayError::malformed("cookie", "not utf-8");
        assert_eq!(err.kind(), "malformed");
        assert_eq!(err.to_string(), "malformed cookie: not utf-8");
    }
}
