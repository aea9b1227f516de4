//! Structured logging for the gateway.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and either a
//! JSON layer (deployed environments) or a pretty layer (local development).
//!
//! Gateway code logs through the plain `tracing` macros with flat fields
//! (`request_id`, `path`, `bucket`, `collaborator`), so JSON output can be
//! indexed consistently:
//!
//! ```rust,ignore
//! tracing::warn!(
//!     request_id = %ctx.request_id(),
//!     method = %ctx.method(),
//!     path = ctx.path(),
//!     "CSRF validation failed"
//! );
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g., "info", "tollgate_middleware=debug,info").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include span events (new, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include target (module path).
    pub include_target: bool,

    /// Whether to emit ANSI colors (pretty format only).
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Creates a development configuration with human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            include_target: true,
            ansi: true,
        }
    }

    /// Creates a production configuration with JSON output.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
            ansi: false,
        }
    }
}

/// Initializes the logging subsystem.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter directive is invalid
/// or a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;
    tracing_subscriber::registry()
        .with(fmt_layer(config).with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Builds the formatting layer selected by `config`.
fn fmt_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
{
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let base = tracing_subscriber::fmt::layer()
        .with_span_events(span_events)
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info)
        .with_target(config.include_target);

    if config.json_format {
        base.json().boxed()
    } else {
        base.pretty().with_ansi(config.ansi).boxed()
    }
}

/// Creates an env filter from a directive string.
///
/// # Errors
///
/// Returns error if the directive is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level: {e}")))
}
