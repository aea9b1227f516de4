//! External collaborators the gateway calls through narrow interfaces.
//!
//! The gateway never implements the rate-limit algorithm, CSRF token
//! cryptography, or session signature verification itself. It orchestrates
//! calls to these traits and maps their failures to fail-open or fail-closed
//! outcomes. All shared state lives behind them, so every implementation
//! must be `Send + Sync`.
//!
//! Async collaborators return [`GatewayResult`]; an `Err` is treated exactly
//! like a timeout by the calling stage.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use http::HeaderMap;
use tollgate_core::{Environment, GatewayResult, RateLimitOutcome, VerifiedSession};

use crate::types::Request;

/// Distributed rate limiter.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Consumes one unit from `bucket` for `fingerprint`.
    async fn check(&self, bucket: &str, fingerprint: &str) -> GatewayResult<RateLimitOutcome>;

    /// Identifies the caller for rate limiting.
    ///
    /// Defaults to [`default_fingerprint`], which trusts the left-most
    /// `X-Forwarded-For` entry. Callers control that entry unless the edge
    /// proxy overwrites the header, so deployments behind a proxy chain that
    /// appends to it must override this, for example keying on the
    /// right-most hop added by their own proxy.
    fn fingerprint(&self, request: &Request) -> String {
        default_fingerprint(request)
    }
}

/// CSRF token validator.
#[async_trait]
pub trait CsrfValidator: Send + Sync {
    /// Returns `Ok(true)` only if the request carries a token matching the
    /// stored session. Missing and invalid tokens both yield `Ok(false)`.
    async fn validate_request(&self, request: &Request) -> GatewayResult<bool>;
}

/// Session token signature verifier.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// Verifies `raw_token` and returns its claims, or `None` if the
    /// signature or format is invalid.
    async fn verify(&self, raw_token: &str) -> GatewayResult<Option<VerifiedSession>>;
}

/// Static cache-control lookup.
pub trait CacheHeaderProvider: Send + Sync {
    /// Headers to attach for `path`; empty when no policy applies.
    fn headers_for(&self, path: &str) -> HeaderMap;
}

/// Static security-header lookup.
pub trait SecurityHeaderProvider: Send + Sync {
    /// Headers to attach to every response in `environment`.
    fn headers_for_environment(&self, environment: Environment) -> HeaderMap;
}

/// Source of the current time, as Unix epoch seconds.
pub trait Clock: Send + Sync {
    /// Current time in whole seconds since the Unix epoch.
    fn now_epoch_secs(&self) -> u64;
}

/// [`Clock`] backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }
}

/// Default caller fingerprint: `ip:path`.
///
/// The IP is the first `X-Forwarded-For` entry, else `X-Real-IP`, else
/// `unknown`. Only sound when the edge proxy replaces `X-Forwarded-For`
/// rather than appending to it; see [`RateLimiter::fingerprint`].
pub fn default_fingerprint(request: &Request) -> String {
    format!("{}:{}", client_ip(request), request.uri().path())
}

/// Best-effort client address from proxy headers.
///
/// The headers are caller-supplied unless a trusted proxy sets them.
pub fn client_ip(request: &Request) -> String {
    let headers = request.headers();

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    };

    forwarded.or_else(real_ip).unwrap_or("unknown").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;

    fn request(headers: &[(&str, &str)]) -> Request {
        let mut builder = http::Request::builder().uri("/api/search?q=flat");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    #[test]
    fn test_fingerprint_prefers_forwarded_for() {
        let req = request(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(default_fingerprint(&req), "203.0.113.7:/api/search");
    }

    #[test]
    fn test_fingerprint_falls_back_to_real_ip() {
        let req = request(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&req), "198.51.100.2");
    }

    #[test]
    fn test_fingerprint_unknown() {
        let req = request(&[("x-forwarded-for", " ")]);
        assert_eq!(default_fingerprint(&req), "unknown:/api/search");
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_epoch_secs() > 1_577_836_800);
    }
}
