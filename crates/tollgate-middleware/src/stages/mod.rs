//! The six gateway stages.
//!
//! 1. [`rate_limit`] - bucket selection and limiter call
//! 2. [`csrf`] - CSRF validation for state-changing methods
//! 3. [`cache`] - cache-control headers
//! 4. [`identity`] - session credential resolution
//! 5. [`authorization`] - ordered decision table
//! 6. [`security_headers`] - environment-dependent response headers

pub mod authorization;
pub mod cache;
pub mod csrf;
pub mod identity;
pub mod rate_limit;
pub mod security_headers;

pub use authorization::{AuthorizationStage, AuthzRule, Denial, RedirectTargets};
pub use cache::{CacheStage, StaticCachePolicy};
pub use csrf::CsrfStage;
pub use identity::IdentityStage;
pub use rate_limit::{BucketSelector, RateLimitStage};
pub use security_headers::{SecurityHeadersStage, StaticSecurityHeaders};

use std::future::Future;
use std::time::Duration;

use tollgate_core::{GatewayError, GatewayResult, RequestContext};

/// Awaits a collaborator call within `budget`.
///
/// Elapsed budgets become [`GatewayError::Timeout`]. Dropping the returned
/// future drops the in-flight call.
pub(crate) async fn call_collaborator<T, F>(
    collaborator: &'static str,
    budget: Duration,
    call: F,
) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::timeout(collaborator, budget)),
    }
}

/// Logs and counts a collaborator failure.
pub(crate) fn report_failure(
    ctx: &RequestContext,
    collaborator: &'static str,
    error: &GatewayError,
    fallback: &'static str,
) {
    tracing::warn!(
        request_id = %ctx.request_id(),
        method = %ctx.method(),
        path = ctx.path(),
        collaborator,
        error = %error,
        fallback,
        "collaborator call failed"
    );
    tollgate_telemetry::metrics::record_collaborator_failure(collaborator, error.kind());
}
