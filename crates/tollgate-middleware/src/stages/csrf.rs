//! CSRF gate.
//!
//! State-changing requests (anything but `GET`, `HEAD` and `OPTIONS`) must
//! carry a token the [`CsrfValidator`] accepts. A missing token, an invalid
//! token, a validator error and a validator timeout all reject with 403.

use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use tollgate_config::CsrfConfig;
use tollgate_core::route::prefix_matches;
use tollgate_core::{Decision, RequestContext};

use super::{call_collaborator, report_failure};
use crate::collaborators::CsrfValidator;
use crate::pipeline::{BoxFuture, Phase, Stage};
use crate::types::Request;

const COLLABORATOR: &str = "csrf_validator";

/// CSRF validation stage.
pub struct CsrfStage {
    validator: Arc<dyn CsrfValidator>,
    enabled: bool,
    exempt_paths: Vec<String>,
    timeout: Duration,
}

impl CsrfStage {
    /// Creates an enabled stage with the given exemptions.
    pub fn new(
        validator: Arc<dyn CsrfValidator>,
        exempt_paths: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            validator,
            enabled: true,
            exempt_paths,
            timeout,
        }
    }

    /// Creates the stage from the `csrf` configuration section.
    pub fn from_config(
        validator: Arc<dyn CsrfValidator>,
        config: &CsrfConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(validator, config.exempt_paths.clone(), timeout)
        }
    }

    /// Returns true if the request must pass validation.
    #[must_use]
    pub fn applies_to(&self, method: &Method, path: &str) -> bool {
        self.enabled
            && !is_safe_method(method)
            && !self
                .exempt_paths
                .iter()
                .any(|prefix| prefix_matches(prefix, path))
    }

    async fn check(&self, ctx: RequestContext, request: &Request) -> RequestContext {
        if !self.applies_to(ctx.method(), ctx.path()) {
            return ctx;
        }

        let call = self.validator.validate_request(request);
        let valid = match call_collaborator(COLLABORATOR, self.timeout, call).await {
            Ok(valid) => valid,
            Err(error) => {
                report_failure(&ctx, COLLABORATOR, &error, "reject");
                false
            }
        };

        if valid {
            return ctx;
        }

        tracing::warn!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = ctx.path(),
            security_event = "csrf_rejected",
            "CSRF token validation failed"
        );
        tollgate_telemetry::metrics::record_csrf_rejection();

        ctx.with_decision(Decision::reject(
            StatusCode::FORBIDDEN,
            serde_json::json!({ "error": "CSRF token validation failed" }),
        ))
    }
}

impl Stage for CsrfStage {
    fn phase(&self) -> Phase {
        Phase::Csrf
    }

    fn run<'a>(&'a self, ctx: RequestContext, request: &'a Request) -> BoxFuture<'a, RequestContext> {
        Box::pin(self.check(ctx, request))
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
