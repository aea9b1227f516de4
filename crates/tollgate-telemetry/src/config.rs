//! Telemetry configuration.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;

/// Configuration for all telemetry subsystems.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryConfig {
    /// Logging configuration.
    pub logging: LogConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl TelemetryConfig {
    /// Pretty debug logs, metrics recorder installed.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LogConfig::development(),
            metrics: MetricsConfig::default(),
        }
    }

    /// JSON info logs, metrics recorder installed.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_differ_in_logging_only() {
        let dev = TelemetryConfig::development();
        let prod = TelemetryConfig::production();
        assert!(!dev.logging.json_format);
        assert!(prod.logging.json_format);
        assert_eq!(dev.metrics, prod.metrics);
    }
}
