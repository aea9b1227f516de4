//! Gateway orchestrator.
//!
//! Classifies the request, runs the fixed pipeline, and either forwards the
//! request to the application or answers it directly.

use std::future::Future;
use std::sync::Arc;

use http::{HeaderMap, HeaderValue};
use tollgate_config::GatewayConfig;
use tollgate_core::{merge_headers, Decision, RequestContext, RouteTable, REQUEST_ID_HEADER};
use tracing::Instrument;

use crate::collaborators::{Clock, CsrfValidator, RateLimiter, SessionVerifier, SystemClock};
use crate::pipeline::{Pipeline, PipelineError};
use crate::stages::{
    AuthorizationStage, BucketSelector, CacheStage, CsrfStage, IdentityStage, RateLimitStage,
    SecurityHeadersStage, StaticCachePolicy, StaticSecurityHeaders,
};
use crate::types::{Request, Response, ResponseExt};

/// The external services a gateway calls.
#[derive(Clone)]
pub struct Collaborators {
    /// Distributed rate limiter.
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// CSRF token validator.
    pub csrf_validator: Arc<dyn CsrfValidator>,
    /// Session token verifier.
    pub session_verifier: Arc<dyn SessionVerifier>,
    /// Time source for expiry and `Retry-After`.
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Bundles the collaborators with the system clock.
    pub fn new(
        rate_limiter: Arc<dyn RateLimiter>,
        csrf_validator: Arc<dyn CsrfValidator>,
        session_verifier: Arc<dyn SessionVerifier>,
    ) -> Self {
        Self {
            rate_limiter,
            csrf_validator,
            session_verifier,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Result of evaluating one request.
#[derive(Debug)]
pub enum GatewayOutcome {
    /// Hand the request to the application, then add `headers` to its
    /// response.
    Forward {
        /// Headers to merge into the application response.
        headers: HeaderMap,
        /// The final context (identity, bucket, categories).
        context: RequestContext,
    },
    /// Answer directly with this response.
    Respond(Response),
}

impl GatewayOutcome {
    /// Returns true for [`GatewayOutcome::Forward`].
    #[must_use]
    pub const fn is_forward(&self) -> bool {
        matches!(self, Self::Forward { .. })
    }

    /// Returns the direct response, if any.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Respond(response) => Some(response),
            Self::Forward { .. } => None,
        }
    }
}

/// The inbound request policy gateway.
///
/// Immutable after construction and cheap to share behind an `Arc`; every
/// request is evaluated independently.
#[derive(Debug)]
pub struct Gateway {
    routes: Arc<RouteTable>,
    pipeline: Pipeline,
}

impl Gateway {
    /// Creates a gateway from a route table and an assembled pipeline.
    #[must_use]
    pub fn new(routes: Arc<RouteTable>, pipeline: Pipeline) -> Self {
        Self { routes, pipeline }
    }

    /// Assembles the standard six-stage gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a configured header is invalid.
    pub fn from_config(
        config: &GatewayConfig,
        collaborators: Collaborators,
    ) -> Result<Self, PipelineError> {
        let routes = Arc::new(config.route_table());
        let timeouts = config.timeouts;

        let cache_policy = StaticCachePolicy::from_config(&config.cache, Arc::clone(&routes))?;
        let security_headers = StaticSecurityHeaders::from_config(&config.security_headers)?;

        let pipeline = Pipeline::builder()
            .stage(RateLimitStage::new(
                collaborators.rate_limiter,
                BucketSelector::from_config(&config.rate_limit),
                timeouts.rate_limiter(),
                Arc::clone(&collaborators.clock),
            ))
            .stage(CsrfStage::from_config(
                collaborators.csrf_validator,
                &config.csrf,
                timeouts.csrf_validator(),
            ))
            .stage(CacheStage::new(Arc::new(cache_policy)))
            .stage(IdentityStage::from_config(
                collaborators.session_verifier,
                &config.identity,
                timeouts.session_verifier(),
                collaborators.clock,
            ))
            .stage(AuthorizationStage::from_config(&config.authorization))
            .stage(SecurityHeadersStage::new(
                Arc::new(security_headers),
                config.gateway.environment,
            ))
            .build()?;

        tracing::info!(
            environment = %config.gateway.environment,
            routes = routes.rules().len(),
            stages = ?pipeline.stage_names(),
            "gateway assembled"
        );

        Ok(Self::new(routes, pipeline))
    }

    /// Returns the route table.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Returns the pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Evaluates a request without calling the application.
    ///
    /// Every outcome carries `x-request-id`. Dropping the returned future
    /// cancels any in-flight collaborator call and emits nothing.
    pub async fn evaluate(&self, request: &Request) -> GatewayOutcome {
        let ctx = RequestContext::from_request(request);
        let span = tracing::debug_span!(
            "gateway",
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = ctx.path(),
        );
        self.evaluate_in_span(ctx, request).instrument(span).await
    }

    async fn evaluate_in_span(&self, ctx: RequestContext, request: &Request) -> GatewayOutcome {
        let categories = self.routes.classify(ctx.path());
        let ctx = self.pipeline.run(ctx.with_categories(categories), request).await;

        let mut request_id = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
            request_id.insert(REQUEST_ID_HEADER, value);
        }
        let ctx = ctx.with_headers(&request_id);

        let decision = ctx.decision();
        let status = match decision {
            Decision::Continue => 0,
            Decision::Reject { status, .. } => status.as_u16(),
            Decision::Redirect { .. } => http::StatusCode::TEMPORARY_REDIRECT.as_u16(),
        };
        tracing::debug!(
            categories = %ctx.categories(),
            bucket = ctx.bucket(),
            identity = ctx.identity().map(tollgate_core::Identity::log_id),
            decision = decision.kind().as_str(),
            status,
            elapsed_us = ctx.elapsed().as_micros(),
            "gateway decision"
        );
        tollgate_telemetry::metrics::record_decision(decision.kind().as_str(), status);
        tollgate_telemetry::metrics::record_pipeline_duration(ctx.elapsed());

        if !ctx.is_terminal() {
            let headers = ctx.response_headers().clone();
            return GatewayOutcome::Forward {
                headers,
                context: ctx,
            };
        }

        let (decision, headers) = ctx.into_parts();
        let mut response = match decision {
            Decision::Reject { status, body } => Response::json(status, &body),
            Decision::Redirect { location } => Response::redirect(&location),
            Decision::Continue => Response::default(),
        };
        merge_headers(response.headers_mut(), &headers);
        GatewayOutcome::Respond(response)
    }

    /// Evaluates a request and, if allowed, calls `handler`.
    ///
    /// Gateway headers replace same-named headers set by the handler.
    pub async fn process<H, Fut>(&self, request: Request, handler: H) -> Response
    where
        H: FnOnce(Request, RequestContext) -> Fut,
        Fut: Future<Output = Response>,
    {
        match self.evaluate(&request).await {
            GatewayOutcome::Respond(response) => response,
            GatewayOutcome::Forward { headers, context } => {
                let mut response = handler(request, context).await;
                merge_headers(response.headers_mut(), &headers);
                response
            }
        }
    }
}
