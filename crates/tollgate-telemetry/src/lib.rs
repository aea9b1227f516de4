//! Observability for the Tollgate policy gateway.
//!
//! - **Logging**: structured JSON (or pretty, in development) via
//!   `tracing-subscriber`
//! - **Metrics**: Prometheus-format counters and histograms via the `metrics`
//!   facade
//!
//! # Example
//!
//! ```rust,ignore
//! use tollgate_telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::production())?;
//!
//! // Later, from the host's /metrics route:
//! let body = tollgate_telemetry::render_metrics().unwrap_or_default();
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging and then metrics.
///
/// Call once at startup; both subsystems install process-global state.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
