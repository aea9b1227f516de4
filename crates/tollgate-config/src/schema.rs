//! Configuration schema types.
//!
//! This module defines the structure of every configuration section. Each
//! section rejects unknown fields and fills missing ones from `default_*`
//! functions, so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tollgate_core::{Environment, RouteCategory, RouteRule, RouteTable};

/// General gateway settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    /// Deployment environment; keys the security-header table.
    #[serde(default)]
    pub environment: Environment,
}

/// Route classification table.
///
/// ```toml
/// [[routes.rules]]
/// prefix = "/admin"
/// categories = ["admin", "protected"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoutesConfig {
    /// Ordered `(prefix, categories)` rules.
    #[serde(default = "RouteTable::default_rules")]
    pub rules: Vec<RouteRule>,

    /// File extensions classified as static assets.
    #[serde(default = "RouteTable::default_static_extensions")]
    pub static_extensions: Vec<String>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            rules: RouteTable::default_rules(),
            static_extensions: RouteTable::default_static_extensions(),
        }
    }
}

/// Maps an API sub-category to a limiter bucket name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BucketRule {
    /// API category that selects this bucket.
    pub category: RouteCategory,

    /// Bucket name passed to the rate limiter.
    pub bucket: String,
}

impl BucketRule {
    /// Creates a bucket rule.
    pub fn new(category: RouteCategory, bucket: impl Into<String>) -> Self {
        Self {
            category,
            bucket: bucket.into(),
        }
    }
}

/// Rate limiter bucket selection.
///
/// Rules are evaluated in order; the first whose category is present wins.
/// API paths that match none use `default_bucket`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Ordered bucket rules.
    #[serde(default = "default_buckets")]
    pub buckets: Vec<BucketRule>,

    /// Bucket for API paths without a more specific category.
    #[serde(default = "default_bucket")]
    pub default_bucket: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            buckets: default_buckets(),
            default_bucket: default_bucket(),
        }
    }
}

fn default_buckets() -> Vec<BucketRule> {
    vec![
        BucketRule::new(RouteCategory::ApiAuth, "auth"),
        BucketRule::new(RouteCategory::ApiUpload, "upload"),
        BucketRule::new(RouteCategory::ApiSearch, "search"),
        BucketRule::new(RouteCategory::ApiTransaction, "transaction"),
    ]
}

fn default_bucket() -> String {
    "default".to_string()
}

/// CSRF gate settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CsrfConfig {
    /// Enable the gate. Only `development` may disable it.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Paths never checked, matched on segment boundaries.
    #[serde(default = "default_csrf_exempt")]
    pub exempt_paths: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exempt_paths: default_csrf_exempt(),
        }
    }
}

fn default_csrf_exempt() -> Vec<String> {
    vec!["/api/csrf".to_string(), "/api/health".to_string()]
}

/// Cache-control policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Extra prefix marking responses as uncacheable, on top of every path
    /// the route table classifies as API.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// `Cache-Control` for static assets.
    #[serde(default = "default_static_cache_control")]
    pub static_cache_control: String,

    /// `Cache-Control` for API responses.
    #[serde(default = "default_api_cache_control")]
    pub api_cache_control: String,

    /// `Pragma` for API responses.
    #[serde(default = "default_api_pragma")]
    pub api_pragma: String,

    /// `Expires` for API responses.
    #[serde(default = "default_api_expires")]
    pub api_expires: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            api_prefix: default_api_prefix(),
            static_cache_control: default_static_cache_control(),
            api_cache_control: default_api_cache_control(),
            api_pragma: default_api_pragma(),
            api_expires: default_api_expires(),
        }
    }
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_static_cache_control() -> String {
    "public, max-age=31536000, immutable".to_string()
}

fn default_api_cache_control() -> String {
    "no-store, no-cache, must-revalidate, proxy-revalidate".to_string()
}

fn default_api_pragma() -> String {
    "no-cache".to_string()
}

fn default_api_expires() -> String {
    "0".to_string()
}

/// Session credential lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Cookie carrying the signed session token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Also accept `Authorization: Bearer <token>` when no cookie is present.
    #[serde(default = "default_true")]
    pub accept_bearer: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            accept_bearer: true,
        }
    }
}

fn default_cookie_name() -> String {
    "session-token".to_string()
}

/// Authorization redirect targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Where anonymous callers are sent.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Where authenticated callers land by default.
    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: String,

    /// Where callers without verified KYC are sent.
    #[serde(default = "default_kyc_path")]
    pub kyc_path: String,

    /// Answer API paths with 401/403 JSON instead of redirects.
    #[serde(default = "default_true")]
    pub api_json_errors: bool,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            dashboard_path: default_dashboard_path(),
            kyc_path: default_kyc_path(),
            api_json_errors: true,
        }
    }
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_dashboard_path() -> String {
    "/dashboard".to_string()
}

fn default_kyc_path() -> String {
    "/onboarding/kyc".to_string()
}

/// Per-environment header additions and overrides.
///
/// ```toml
/// [security_headers.production]
/// "Content-Security-Policy" = "default-src 'self'"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SecurityHeadersConfig {
    /// Extra headers in development.
    #[serde(default)]
    pub development: BTreeMap<String, String>,

    /// Extra headers in staging.
    #[serde(default)]
    pub staging: BTreeMap<String, String>,

    /// Extra headers in production.
    #[serde(default)]
    pub production: BTreeMap<String, String>,
}

impl SecurityHeadersConfig {
    /// Returns the overrides for `environment`.
    #[must_use]
    pub const fn for_environment(&self, environment: Environment) -> &BTreeMap<String, String> {
        match environment {
            Environment::Development => &self.development,
            Environment::Staging => &self.staging,
            Environment::Production => &self.production,
        }
    }

    /// Iterates over every `(environment, overrides)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (Environment, &BTreeMap<String, String>)> {
        [
            (Environment::Development, &self.development),
            (Environment::Staging, &self.staging),
            (Environment::Production, &self.production),
        ]
        .into_iter()
    }
}

/// Collaborator time budgets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsConfig {
    /// Rate limiter budget in milliseconds.
    #[serde(default = "default_rate_limiter_ms")]
    pub rate_limiter_ms: u64,

    /// CSRF validator budget in milliseconds.
    #[serde(default = "default_csrf_validator_ms")]
    pub csrf_validator_ms: u64,

    /// Session verifier budget in milliseconds.
    #[serde(default = "default_session_verifier_ms")]
    pub session_verifier_ms: u64,
}

impl TimeoutsConfig {
    /// Rate limiter budget.
    #[must_use]
    pub const fn rate_limiter(&self) -> Duration {
        Duration::from_millis(self.rate_limiter_ms)
    }

    /// CSRF validator budget.
    #[must_use]
    pub const fn csrf_validator(&self) -> Duration {
        Duration::from_millis(self.csrf_validator_ms)
    }

    /// Session verifier budget.
    #[must_use]
    pub const fn session_verifier(&self) -> Duration {
        Duration::from_millis(self.session_verifier_ms)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            rate_limiter_ms: default_rate_limiter_ms(),
            csrf_validator_ms: default_csrf_validator_ms(),
            session_verifier_ms: default_session_verifier_ms(),
        }
    }
}

fn default_rate_limiter_ms() -> u64 {
    250
}

fn default_csrf_validator_ms() -> u64 {
    250
}

fn default_session_verifier_ms() -> u64 {
    500
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include ANSI color codes in output.
    #[serde(default)]
    pub ansi_enabled: bool,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            ansi_enabled: false,
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Install the Prometheus recorder.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pipeline duration histogram buckets, in seconds.
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_buckets: default_duration_buckets(),
        }
    }
}

fn default_duration_buckets() -> Vec<f64> {
    tollgate_telemetry::MetricsConfig::default().duration_buckets
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl TelemetrySection {
    /// Converts this section into the telemetry crate's runtime config.
    #[must_use]
    pub fn to_telemetry_config(&self) -> tollgate_telemetry::TelemetryConfig {
        let pretty = self.logging.format == LogFormat::Pretty;
        tollgate_telemetry::TelemetryConfig {
            logging: tollgate_telemetry::LogConfig {
                enabled: self.logging.enabled,
                level: self.logging.level.clone(),
                json_format: !pretty,
                span_events: pretty,
                file_line_info: self.logging.include_location,
                include_target: true,
                ansi: self.logging.ansi_enabled,
            },
            metrics: tollgate_telemetry::MetricsConfig {
                enabled: self.metrics.enabled,
                duration_buckets: self.metrics.duration_buckets.clone(),
            },
        }
    }
}

fn default_true() -> bool {
    true
}
