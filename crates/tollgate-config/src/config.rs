//! Main configuration type.
//!
//! This module provides the top-level [`GatewayConfig`] struct, its presets,
//! and validation.

use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tollgate_core::{Environment, RouteTable};

use crate::{
    AuthorizationConfig, CacheConfig, ConfigError, CsrfConfig, GatewaySection, IdentityConfig,
    LogFormat, RateLimitConfig, RoutesConfig, SecurityHeadersConfig, TelemetrySection,
    TimeoutsConfig,
};

/// Complete gateway configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use tollgate_config::GatewayConfig;
///
/// let config = GatewayConfig::default();
/// assert_eq!(config.rate_limit.default_bucket, "default");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// General settings.
    #[serde(default)]
    pub gateway: GatewaySection,

    /// Route classification table.
    #[serde(default)]
    pub routes: RoutesConfig,

    /// Rate limiter bucket selection.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// CSRF gate.
    #[serde(default)]
    pub csrf: CsrfConfig,

    /// Cache-control policy.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Session credential lookup.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Authorization redirect targets.
    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Security header overrides.
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,

    /// Collaborator time budgets.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl GatewayConfig {
    /// Builds the immutable route table described by `routes`.
    #[must_use]
    pub fn route_table(&self) -> RouteTable {
        RouteTable::new(
            self.routes.rules.clone(),
            self.routes.static_extensions.iter().cloned(),
        )
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem found as `ConfigError::InvalidValue`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_routes()?;
        self.validate_rate_limit()?;
        self.validate_csrf()?;
        self.validate_cache()?;
        self.validate_identity()?;
        self.validate_authorization()?;
        self.validate_security_headers()?;
        self.validate_timeouts()?;
        self.validate_telemetry()
    }

    fn validate_routes(&self) -> Result<(), ConfigError> {
        for (i, rule) in self.routes.rules.iter().enumerate() {
            check_prefix(&format!("routes.rules[{i}].prefix"), &rule.prefix)?;
            if rule.categories.is_empty() {
                return Err(ConfigError::invalid_value(
                    format!("routes.rules[{i}].categories"),
                    "must name at least one category",
                ));
            }
        }
        for ext in &self.routes.static_extensions {
            if ext.trim_start_matches('.').is_empty() || ext.contains('/') {
                return Err(ConfigError::invalid_value(
                    "routes.static_extensions",
                    format!("invalid extension '{ext}'"),
                ));
            }
        }
        Ok(())
    }

    fn validate_rate_limit(&self) -> Result<(), ConfigError> {
        for (i, rule) in self.rate_limit.buckets.iter().enumerate() {
            if !rule.category.is_api() {
                return Err(ConfigError::invalid_value(
                    format!("rate_limit.buckets[{i}].category"),
                    format!("'{}' is not an API category", rule.category),
                ));
            }
            if rule.bucket.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    format!("rate_limit.buckets[{i}].bucket"),
                    "must not be empty",
                ));
            }
        }
        if self.rate_limit.default_bucket.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "rate_limit.default_bucket",
                "must not be empty",
            ));
        }
        Ok(())
    }

    fn validate_csrf(&self) -> Result<(), ConfigError> {
        if !self.csrf.enabled && self.gateway.environment != Environment::Development {
            return Err(ConfigError::invalid_value(
                "csrf.enabled",
                format!(
                    "CSRF protection can only be disabled in development, not {}",
                    self.gateway.environment
                ),
            ));
        }
        for path in &self.csrf.exempt_paths {
            check_prefix("csrf.exempt_paths", path)?;
        }
        Ok(())
    }

    fn validate_cache(&self) -> Result<(), ConfigError> {
        check_prefix("cache.api_prefix", &self.cache.api_prefix)?;
        check_header_value("cache.static_cache_control", &self.cache.static_cache_control)?;
        check_header_value("cache.api_cache_control", &self.cache.api_cache_control)?;
        check_header_value("cache.api_pragma", &self.cache.api_pragma)?;
        check_header_value("cache.api_expires", &self.cache.api_expires)
    }

    fn validate_identity(&self) -> Result<(), ConfigError> {
        let name = &self.identity.cookie_name;
        let invalid = name.is_empty()
            || name
                .bytes()
                .any(|b| b.is_ascii_whitespace() || b.is_ascii_control() || b";=,\"".contains(&b));
        if invalid {
            return Err(ConfigError::invalid_value(
                "identity.cookie_name",
                format!("'{name}' is not a valid cookie name"),
            ));
        }
        Ok(())
    }

    fn validate_authorization(&self) -> Result<(), ConfigError> {
        check_local_path("authorization.login_path", &self.authorization.login_path)?;
        check_local_path("authorization.dashboard_path", &self.authorization.dashboard_path)?;
        check_local_path("authorization.kyc_path", &self.authorization.kyc_path)
    }

    fn validate_security_headers(&self) -> Result<(), ConfigError> {
        for (environment, overrides) in self.security_headers.iter() {
            for (name, value) in overrides {
                let field = format!("security_headers.{environment}.{name}");
                if HeaderName::from_bytes(name.as_bytes()).is_err() {
                    return Err(ConfigError::invalid_value(field, "invalid header name"));
                }
                check_header_value(&field, value)?;
            }
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("timeouts.rate_limiter_ms", self.timeouts.rate_limiter_ms),
            ("timeouts.csrf_validator_ms", self.timeouts.csrf_validator_ms),
            ("timeouts.session_verifier_ms", self.timeouts.session_verifier_ms),
        ];
        for (field, ms) in timeouts {
            if ms == 0 {
                return Err(ConfigError::invalid_value(field, "must be greater than zero"));
            }
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<(), ConfigError> {
        let logging = &self.telemetry.logging;
        if logging.enabled {
            tollgate_telemetry::logging::create_env_filter(&logging.level).map_err(|e| {
                ConfigError::invalid_value("telemetry.logging.level", e.to_string())
            })?;
        }
        let metrics = &self.telemetry.metrics;
        if metrics.enabled && metrics.duration_buckets.is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.duration_buckets",
                "must not be empty when metrics are enabled",
            ));
        }
        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// - `development` environment (relaxed CSP, no HSTS)
    /// - Pretty debug logs with ANSI colors and source locations
    ///
    /// # Example
    ///
    /// ```
    /// use tollgate_config::GatewayConfig;
    /// use tollgate_core::Environment;
    ///
    /// let config = GatewayConfig::development();
    /// assert_eq!(config.gateway.environment, Environment::Development);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.gateway.environment = Environment::Development;

        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.ansi_enabled = true;
        config.telemetry.logging.include_location = true;

        config
    }

    /// Create a production configuration preset.
    ///
    /// - `production` environment (strict CSP, HSTS)
    /// - JSON info logs
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.gateway.environment = Environment::Production;

        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.logging.ansi_enabled = false;

        config
    }
}

fn check_prefix(field: &str, prefix: &str) -> Result<(), ConfigError> {
    if prefix.is_empty() {
        return Err(ConfigError::invalid_value(field, "must not be empty"));
    }
    if !prefix.starts_with('/') {
        return Err(ConfigError::invalid_value(
            field,
            format!("'{prefix}' must start with '/'"),
        ));
    }
    Ok(())
}

fn check_local_path(field: &str, path: &str) -> Result<(), ConfigError> {
    check_prefix(field, path)?;
    if path.starts_with("//") || path.contains('\\') || path.contains('?') {
        return Err(ConfigError::invalid_value(
            field,
            format!("'{path}' must be a local path without a query"),
        ));
    }
    Ok(())
}

fn check_header_value(field: &str, value: &str) -> Result<(), ConfigError> {
    HeaderValue::from_str(value)
        .map(|_| ())
        .map_err(|_| ConfigError::invalid_value(field, "invalid header value"))
}
