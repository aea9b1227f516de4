//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while installing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize metrics.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::MetricsInit("recorder already installed".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to initialize metrics: recorder already installed"
        );
    }

    #[test]
    fn test_invalid_config_display() {
        let err = TelemetryError::InvalidConfig("empty bucket list".to_string());
        assert!(err.to_string().contains("empty bucket list"));
    }
}
