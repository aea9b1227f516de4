//! Rate limiting stage.
//!
//! Only API paths are rate limited. The stage picks a bucket from the route
//! categories, asks the [`RateLimiter`] collaborator for a verdict, and
//! records the outcome on the context.
//!
//! ## Response Headers
//!
//! Every rate-limited path gets:
//!
//! - `X-RateLimit-Limit`: Maximum requests allowed in the window
//! - `X-RateLimit-Remaining`: Remaining requests in the window
//! - `X-RateLimit-Reset`: Unix timestamp when the window resets
//!
//! On rejection (429) it also adds `Retry-After`.
//!
//! ## Failure Mode
//!
//! Fail closed: a limiter timeout or error rejects the request with 429.

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderValue, StatusCode};
use tollgate_config::RateLimitConfig;
use tollgate_core::{CategorySet, Decision, RateLimitOutcome, RequestContext, RouteCategory};

use super::{call_collaborator, report_failure};
use crate::collaborators::{Clock, RateLimiter};
use crate::pipeline::{BoxFuture, Phase, Stage};
use crate::types::Request;

const COLLABORATOR: &str = "rate_limiter";

/// Rate limit header names.
pub mod headers {
    /// Maximum requests allowed in the window.
    pub const LIMIT: &str = "x-ratelimit-limit";
    /// Remaining requests in current window.
    pub const REMAINING: &str = "x-ratelimit-remaining";
    /// Unix timestamp when the window resets.
    pub const RESET: &str = "x-ratelimit-reset";
    /// Seconds to wait before retrying (on 429).
    pub const RETRY_AFTER: &str = "retry-after";
}

/// Maps API categories to limiter buckets.
///
/// Rules are checked in order; the first category present wins. API paths
/// that match no rule use the default bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSelector {
    rules: Vec<(RouteCategory, String)>,
    default_bucket: String,
}

impl BucketSelector {
    /// Creates a selector.
    pub fn new(rules: Vec<(RouteCategory, String)>, default_bucket: impl Into<String>) -> Self {
        Self {
            rules,
            default_bucket: default_bucket.into(),
        }
    }

    /// Builds the selector from the `rate_limit` configuration section.
    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config
                .buckets
                .iter()
                .map(|rule| (rule.category, rule.bucket.clone()))
                .collect(),
            config.default_bucket.clone(),
        )
    }

    /// Returns the bucket for `categories`, or `None` for non-API paths.
    #[must_use]
    pub fn select(&self, categories: CategorySet) -> Option<&str> {
        if !categories.is_api() {
            return None;
        }
        let bucket = self
            .rules
            .iter()
            .find(|(category, _)| categories.contains(*category))
            .map_or(self.default_bucket.as_str(), |(_, bucket)| bucket.as_str());
        Some(bucket)
    }
}

impl Default for BucketSelector {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

/// Rate limiting stage.
pub struct RateLimitStage {
    limiter: Arc<dyn RateLimiter>,
    selector: BucketSelector,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimitStage {
    /// Creates the stage.
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        selector: BucketSelector,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiter,
            selector,
            timeout,
            clock,
        }
    }

    async fn check(&self, ctx: RequestContext, request: &Request) -> RequestContext {
        let Some(bucket) = self.selector.select(ctx.categories()) else {
            return ctx;
        };

        let fingerprint = self.limiter.fingerprint(request);
        let now = self.clock.now_epoch_secs();

        let call = self.limiter.check(bucket, &fingerprint);
        let (outcome, unavailable) = match call_collaborator(COLLABORATOR, self.timeout, call).await
        {
            Ok(outcome) => (outcome, false),
            Err(error) => {
                report_failure(&ctx, COLLABORATOR, &error, "reject");
                (RateLimitOutcome::unavailable(now), true)
            }
        };

        let mut response_headers = rate_limit_headers(&outcome);
        let ctx = ctx.with_rate_limit(bucket, outcome);

        if outcome.allowed {
            return ctx.with_headers(&response_headers);
        }

        let retry_after = outcome.retry_after(now);
        response_headers.insert(headers::RETRY_AFTER, HeaderValue::from(retry_after));

        tracing::debug!(
            request_id = %ctx.request_id(),
            path = ctx.path(),
            bucket,
            retry_after,
            "rate limit exceeded"
        );
        tollgate_telemetry::metrics::record_rate_limited(bucket);

        let error = if unavailable {
            "Rate limiter unavailable"
        } else {
            "Too many requests"
        };
        ctx.with_headers(&response_headers)
            .with_decision(Decision::reject(
                StatusCode::TOO_MANY_REQUESTS,
                serde_json::json!({
                    "error": error,
                    "code": "RATE_LIMITED",
                    "retryAfter": retry_after,
                }),
            ))
    }
}

impl Stage for RateLimitStage {
    fn phase(&self) -> Phase {
        Phase::RateLimit
    }

    fn run<'a>(&'a self, ctx: RequestContext, request: &'a Request) -> BoxFuture<'a, RequestContext> {
        Box::pin(self.check(ctx, request))
    }
}

fn rate_limit_headers(outcome: &RateLimitOutcome) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(headers::LIMIT, HeaderValue::from(outcome.limit));
    map.insert(headers::REMAINING, HeaderValue::from(outcome.remaining));
    map.insert(headers::RESET, HeaderValue::from(outcome.reset_at));
    map
}
