//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::{ConfigError, GatewayConfig, LogFormat};

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values or a preset
/// 2. Configuration files or strings (TOML or JSON), merged table by table
/// 3. Environment variables (`PREFIX__SECTION__KEY`)
///
/// Tables from a file are merged into the current configuration key by key;
/// arrays and scalars replace what was there.
///
/// # Example
///
/// ```no_run
/// use tollgate_config::ConfigLoader;
///
/// # fn main() -> Result<(), tollgate_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_production()
///     .with_file("gateway.toml")?
///     .with_dotenv()?
///     .with_env_prefix("TOLLGATE")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: GatewayConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader seeded with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = GatewayConfig::default();
        self
    }

    /// Start with the development preset.
    ///
    /// # Example
    ///
    /// ```
    /// use tollgate_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = GatewayConfig::development();
        self
    }

    /// Start with the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = GatewayConfig::production();
        self
    }

    /// Merge configuration from a file.
    ///
    /// The format is chosen by extension: `.toml` or `.json`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist or cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let overlay = parse_value(&content, &format).map_err(|e| match e {
            ConfigError::UnsupportedFormat(_) => {
                ConfigError::UnsupportedFormat(path.display().to_string())
            }
            other => other,
        })?;

        self.merge_config(overlay)?;
        Ok(self)
    }

    /// Merge configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merge configuration from a string in `format` (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the content has unknown fields.
    ///
    /// # Example
    ///
    /// ```
    /// use tollgate_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [rate_limit]
    ///     default_bucket = "api"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.rate_limit.default_bucket, "api");
    /// assert_eq!(config.csrf.exempt_paths.len(), 2);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let overlay = parse_value(content, &format.to_lowercase())?;
        self.merge_config(overlay)?;
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Variables use the format `PREFIX__SECTION__KEY`, for example
    /// `TOLLGATE__GATEWAY__ENVIRONMENT=staging` or
    /// `TOLLGATE__TIMEOUTS__RATE_LIMITER_MS=100`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a `.env` file exists but is malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variable overrides (if a prefix was set) and
    /// validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or validation fails.
    pub fn load(mut self) -> Result<GatewayConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: BTreeMap<String, String> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> GatewayConfig {
        self.config
    }

    fn merge_config(&mut self, overlay: Value) -> Result<(), ConfigError> {
        let mut base = serde_json::to_value(&self.config)?;
        merge_value(&mut base, overlay);
        self.config = serde_json::from_value(base).map_err(ConfigError::Schema)?;
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            // Shares the prefix but not the separator, e.g. TOLLGATE_HOME.
            return Ok(());
        };

        let parts: Vec<&str> = rest.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["GATEWAY", "ENVIRONMENT"] => {
                config.gateway.environment = value
                    .parse()
                    .map_err(|e: String| ConfigError::env_var(key, e))?;
            }

            ["RATE_LIMIT", "DEFAULT_BUCKET"] => {
                config.rate_limit.default_bucket = value.to_string();
            }

            ["CSRF", "ENABLED"] => config.csrf.enabled = parse_bool_var(key, value)?,
            ["CSRF", "EXEMPT_PATHS"] => config.csrf.exempt_paths = parse_list(value),

            ["CACHE", "API_PREFIX"] => config.cache.api_prefix = value.to_string(),
            ["CACHE", "STATIC_CACHE_CONTROL"] => {
                config.cache.static_cache_control = value.to_string();
            }
            ["CACHE", "API_CACHE_CONTROL"] => config.cache.api_cache_control = value.to_string(),
            ["CACHE", "API_PRAGMA"] => config.cache.api_pragma = value.to_string(),
            ["CACHE", "API_EXPIRES"] => config.cache.api_expires = value.to_string(),

            ["IDENTITY", "COOKIE_NAME"] => config.identity.cookie_name = value.to_string(),
            ["IDENTITY", "ACCEPT_BEARER"] => {
                config.identity.accept_bearer = parse_bool_var(key, value)?;
            }

            ["AUTHORIZATION", "LOGIN_PATH"] => config.authorization.login_path = value.to_string(),
            ["AUTHORIZATION", "DASHBOARD_PATH"] => {
                config.authorization.dashboard_path = value.to_string();
            }
            ["AUTHORIZATION", "KYC_PATH"] => config.authorization.kyc_path = value.to_string(),
            ["AUTHORIZATION", "API_JSON_ERRORS"] => {
                config.authorization.api_json_errors = parse_bool_var(key, value)?;
            }

            ["TIMEOUTS", "RATE_LIMITER_MS"] => {
                config.timeouts.rate_limiter_ms = parse_u64_var(key, value)?;
            }
            ["TIMEOUTS", "CSRF_VALIDATOR_MS"] => {
                config.timeouts.csrf_validator_ms = parse_u64_var(key, value)?;
            }
            ["TIMEOUTS", "SESSION_VERIFIER_MS"] => {
                config.timeouts.session_verifier_ms = parse_u64_var(key, value)?;
            }

            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                config.telemetry.logging.enabled = parse_bool_var(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_var(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "ANSI_ENABLED"] => {
                config.telemetry.logging.ansi_enabled = parse_bool_var(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
                config.telemetry.logging.include_location = parse_bool_var(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                config.telemetry.metrics.enabled = parse_bool_var(key, value)?;
            }

            // Tables (routes, buckets, security headers) are file-only.
            _ => {}
        }

        Ok(())
    }
}

fn parse_value(content: &str, format: &str) -> Result<Value, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        _ => Err(ConfigError::UnsupportedFormat(format.to_string())),
    }
}

/// Recursively merges `overlay` into `base`. Objects merge per key; anything
/// else replaces.
fn merge_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_var(key, "expected boolean"))
}

fn parse_u64_var(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_var(key, "expected integer"))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::{Environment, RouteCategory};

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.gateway.environment, Environment::Development);
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_string_merges_onto_preset() {
        let toml = r#"
            [timeouts]
            rate_limiter_ms = 50
        "#;
        let config = ConfigLoader::new()
            .with_development()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.timeouts.rate_limiter_ms, 50);
        assert_eq!(config.timeouts.session_verifier_ms, 500);
        assert_eq!(config.gateway.environment, Environment::Development);
        assert_eq!(config.telemetry.logging.level, "debug");
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"csrf": {"exempt_paths": ["/api/webhooks"]}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.csrf.exempt_paths, vec!["/api/webhooks"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
            [csrf]
            enabeld = false
        "#;
        let result = ConfigLoader::new().with_string(toml, "toml");
        assert!(matches!(result, Err(ConfigError::Schema(_))));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = ConfigLoader::new().with_string("[server]\nport = 1", "toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let result = ConfigLoader::new().with_string("a: b", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_routes_replace_not_append() {
        let toml = r#"
            [[routes.rules]]
            prefix = "/reports"
            categories = ["protected"]
        "#;
        let config = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.routes.rules.len(), 1);
        assert_eq!(config.routes.rules[0].categories, vec![RouteCategory::Protected]);
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/gateway.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/gateway.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_load_validates() {
        let result = ConfigLoader::new()
            .with_string("[timeouts]\nrate_limiter_ms = 0", "toml")
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_load_unvalidated() {
        let config = ConfigLoader::new()
            .with_string("[timeouts]\nrate_limiter_ms = 0", "toml")
            .unwrap()
            .load_unvalidated();
        assert_eq!(config.timeouts.rate_limiter_ms, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("/a, /b,,"), vec!["/a", "/b"]);
        assert!(parse_list("").is_empty());
    }

    // Env overrides are exercised through apply_env_var directly; the
    // workspace forbids the unsafe set_var calls needed to mutate the
    // process environment.

    #[test]
    fn test_apply_env_var_environment() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__GATEWAY__ENVIRONMENT", "staging", "TEST")
            .unwrap();
        assert_eq!(loader.config.gateway.environment, Environment::Staging);

        assert!(loader
            .apply_env_var("TEST__GATEWAY__ENVIRONMENT", "qa", "TEST")
            .is_err());
    }

    #[test]
    fn test_apply_env_var_timeouts_and_flags() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__TIMEOUTS__SESSION_VERIFIER_MS", "75", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__IDENTITY__ACCEPT_BEARER", "no", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__CSRF__EXEMPT_PATHS", "/api/health,/api/hooks", "TEST")
            .unwrap();

        assert_eq!(loader.config.timeouts.session_verifier_ms, 75);
        assert!(!loader.config.identity.accept_bearer);
        assert_eq!(loader.config.csrf.exempt_paths, vec!["/api/health", "/api/hooks"]);
    }

    #[test]
    fn test_apply_env_var_invalid_integer() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__TIMEOUTS__RATE_LIMITER_MS", "fast", "TEST");
        assert!(matches!(result, Err(ConfigError::EnvVar { .. })));
    }

    #[test]
    fn test_apply_env_var_log_format() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__TELEMETRY__LOGGING__FORMAT", "pretty", "TEST")
            .unwrap();
        assert_eq!(loader.config.telemetry.logging.format, LogFormat::Pretty);
        assert!(loader
            .apply_env_var("TEST__TELEMETRY__LOGGING__FORMAT", "xml", "TEST")
            .is_err());
    }

    #[test]
    fn test_apply_env_var_ignores_unrelated_keys() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TESTING", "1", "TEST").unwrap();
        loader.apply_env_var("TEST__NOPE__KEY", "1", "TEST").unwrap();
        assert_eq!(loader.config, GatewayConfig::default());
    }
}
