//! Prometheus metrics for the gateway.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `tollgate_decisions_total` | Counter | `decision`, `status` | Final pipeline decisions |
//! | `tollgate_rate_limited_total` | Counter | `bucket` | Requests rejected with 429 |
//! | `tollgate_csrf_rejections_total` | Counter | - | Requests rejected by the CSRF gate |
//! | `tollgate_collaborator_failures_total` | Counter | `collaborator`, `kind` | Collaborator timeouts and errors |
//! | `tollgate_pipeline_duration_seconds` | Histogram | - | Time spent deciding a request |
//!
//! Recording functions are safe to call before [`init_metrics`]; the
//! `metrics` facade drops samples when no recorder is installed.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names.
pub mod names {
    /// Final pipeline decisions.
    pub const DECISIONS_TOTAL: &str = "tollgate_decisions_total";
    /// 429 rejections per bucket.
    pub const RATE_LIMITED_TOTAL: &str = "tollgate_rate_limited_total";
    /// CSRF rejections.
    pub const CSRF_REJECTIONS_TOTAL: &str = "tollgate_csrf_rejections_total";
    /// Collaborator failures.
    pub const COLLABORATOR_FAILURES_TOTAL: &str = "tollgate_collaborator_failures_total";
    /// Pipeline latency.
    pub const PIPELINE_DURATION_SECONDS: &str = "tollgate_pipeline_duration_seconds";
}

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder.
    pub enabled: bool,

    /// Histogram buckets for pipeline duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // 100us .. 1s; the pipeline itself is sub-millisecond without collaborator latency
            duration_buckets: vec![
                0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder and registers metric descriptions.
///
/// The exporter does not bind a listener; the host application serves
/// [`render_metrics`] from its own `/metrics` route.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` for an empty bucket list and
/// `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    if config.duration_buckets.is_empty() {
        return Err(TelemetryError::InvalidConfig(
            "duration_buckets must not be empty".to_string(),
        ));
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::PIPELINE_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    Ok(())
}

/// Returns the global metrics handle if initialized.
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        names::DECISIONS_TOTAL,
        "Final gateway decisions by kind and HTTP status"
    );
    describe_counter!(
        names::RATE_LIMITED_TOTAL,
        "Requests rejected by the rate limiter, by bucket"
    );
    describe_counter!(
        names::CSRF_REJECTIONS_TOTAL,
        "Requests rejected by CSRF validation"
    );
    describe_counter!(
        names::COLLABORATOR_FAILURES_TOTAL,
        "Collaborator calls that timed out or failed"
    );
    describe_histogram!(
        names::PIPELINE_DURATION_SECONDS,
        "Time spent evaluating the gateway pipeline in seconds"
    );
}

/// Records the final decision of one request.
///
/// * `decision` - `continue`, `reject`, or `redirect`
/// * `status` - the status the gateway answered with (0 when forwarded)
pub fn record_decision(decision: &'static str, status: u16) {
    counter!(
        names::DECISIONS_TOTAL,
        "decision" => decision,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Records a 429 rejection for `bucket`.
pub fn record_rate_limited(bucket: &str) {
    counter!(names::RATE_LIMITED_TOTAL, "bucket" => bucket.to_string()).increment(1);
}

/// Records a CSRF rejection.
pub fn record_csrf_rejection() {
    counter!(names::CSRF_REJECTIONS_TOTAL).increment(1);
}

/// Records a collaborator timeout or error.
///
/// * `collaborator` - e.g. `rate_limiter`, `csrf_validator`, `session_verifier`
/// * `kind` - `timeout`, `unavailable`, or `malformed`
pub fn record_collaborator_failure(collaborator: &'static str, kind: &'static str) {
    counter!(
        names::COLLABORATOR_FAILURES_TOTAL,
        "collaborator" => collaborator,
        "kind" => kind
    )
    .increment(1);
}

/// Records how long the pipeline took for one request.
pub fn record_pipeline_duration(duration: Duration) {
    histogram!(names::PIPELINE_DURATION_SECONDS).record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(!config.duration_buckets.is_empty());
    }

    #[test]
    fn test_empty_buckets_rejected() {
        let config = MetricsConfig {
            enabled: true,
            duration_buckets: Vec::new(),
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_disabled_is_noop() {
        let config = MetricsConfig {
            enabled: false,
            duration_buckets: Vec::new(),
        };
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_record_functions_dont_panic() {
        // No recorder installed; the facade drops these.
        record_decision("reject", 429);
        record_rate_limited("auth");
        record_csrf_rejection();
        record_collaborator_failure("rate_limiter", "timeout");
        record_pipeline_duration(Duration::from_micros(250));
    }
}
