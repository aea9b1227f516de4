//! Security header stage.
//!
//! Runs last and always, including on rejected and redirected responses.
//! Headers depend only on the deployment environment.

use std::collections::HashMap;
use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue};
use tollgate_config::SecurityHeadersConfig;
use tollgate_core::{Environment, RequestContext};

use crate::collaborators::SecurityHeaderProvider;
use crate::pipeline::{BoxFuture, Phase, PipelineError, Stage};
use crate::types::Request;

const CSP_DEPLOYED: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; \
style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; font-src 'self' data:; \
connect-src 'self' https:; frame-ancestors 'none'; base-uri 'self'; form-action 'self'";

const CSP_DEVELOPMENT: &str = "default-src 'self'; script-src 'self' 'unsafe-inline' 'unsafe-eval'; \
style-src 'self' 'unsafe-inline'; img-src 'self' data: https: http:; font-src 'self' data:; \
connect-src 'self' ws: wss: http: https:; frame-ancestors 'none'; base-uri 'self'; form-action 'self'";

const HSTS: &str = "max-age=63072000; includeSubDomains; preload";

/// Per-environment header sets built once at startup.
#[derive(Debug, Clone)]
pub struct StaticSecurityHeaders {
    by_environment: HashMap<Environment, HeaderMap>,
}

impl StaticSecurityHeaders {
    /// The built-in header sets.
    #[must_use]
    pub fn defaults() -> Self {
        let by_environment = [
            Environment::Development,
            Environment::Staging,
            Environment::Production,
        ]
        .into_iter()
        .map(|env| (env, default_headers(env)))
        .collect();
        Self { by_environment }
    }

    /// The built-in sets with configured additions and overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidHeader`] for a name or value that is
    /// not valid HTTP.
    pub fn from_config(config: &SecurityHeadersConfig) -> Result<Self, PipelineError> {
        let mut headers = Self::defaults();
        for (env, overrides) in config.iter() {
            let map = headers.by_environment.entry(env).or_default();
            for (name, value) in overrides {
                let header = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| PipelineError::invalid_header(name, e.to_string()))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| PipelineError::invalid_header(name, e.to_string()))?;
                map.insert(header, value);
            }
        }
        Ok(headers)
    }
}

impl Default for StaticSecurityHeaders {
    fn default() -> Self {
        Self::defaults()
    }
}

impl SecurityHeaderProvider for StaticSecurityHeaders {
    fn headers_for_environment(&self, environment: Environment) -> HeaderMap {
        self.by_environment
            .get(&environment)
            .cloned()
            .unwrap_or_default()
    }
}

fn default_headers(environment: Environment) -> HeaderMap {
    let csp = match environment {
        Environment::Development => CSP_DEVELOPMENT,
        Environment::Staging | Environment::Production => CSP_DEPLOYED,
    };

    let mut map = HeaderMap::new();
    map.insert(http::header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    map.insert(
        http::header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    map.insert(
        http::header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    map.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    map.insert(
        http::header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    map.insert(
        http::header::X_DNS_PREFETCH_CONTROL,
        HeaderValue::from_static("off"),
    );
    map.insert(
        http::header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(csp),
    );
    if environment.is_deployed() {
        map.insert(
            http::header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS),
        );
    }
    map
}

/// Security header stage.
pub struct SecurityHeadersStage {
    provider: Arc<dyn SecurityHeaderProvider>,
    environment: Environment,
}

impl SecurityHeadersStage {
    /// Creates the stage for one environment.
    pub fn new(provider: Arc<dyn SecurityHeaderProvider>, environment: Environment) -> Self {
        Self {
            provider,
            environment,
        }
    }
}

impl Stage for SecurityHeadersStage {
    fn phase(&self) -> Phase {
        Phase::SecurityHeaders
    }

    fn run<'a>(&'a self, ctx: RequestContext, _request: &'a Request) -> BoxFuture<'a, RequestContext> {
        Box::pin(async move {
            let headers = self.provider.headers_for_environment(self.environment);
            ctx.with_headers(&headers)
        })
    }
}
