//! Request context types.
//!
//! The [`RequestContext`] carries all per-request state through the gateway
//! pipeline. Stages receive it by value and hand back an enriched copy, so
//! no stage ever writes into a shared response object; accumulated headers
//! are only merged into a response at the very end.

use crate::decision::{Decision, RateLimitOutcome};
use crate::identity::Identity;
use crate::route::CategorySet;
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Header carrying the request ID in and out of the gateway.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for request tracking
/// and log correlation.
///
/// # Example
///
/// ```
/// use tollgate_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses an inbound `x-request-id` value, if it is a well-formed UUID.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-request state that flows through the gateway pipeline.
///
/// `path` and `method` are fixed at construction. Every other field is set
/// by exactly one stage:
///
/// | Field | Set by |
/// |---|---|
/// | `categories` | route classification |
/// | `rate_limit`, `bucket` | rate limit stage |
/// | `identity` | identity stage |
/// | `decision` | rate limit, CSRF, or authorization stage |
/// | `response_headers` | rate limit, cache, and security header stages |
///
/// # Example
///
/// ```
/// use tollgate_core::{Decision, RequestContext};
/// use http::Method;
///
/// let ctx = RequestContext::new(Method::GET, "/admin")
///     .with_decision(Decision::redirect("/login"))
///     .with_decision(Decision::Continue);
///
/// // The first terminal decision sticks.
/// assert_eq!(ctx.decision().location(), Some("/login"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    path: String,
    query: Option<String>,
    categories: CategorySet,
    bucket: Option<String>,
    rate_limit: Option<RateLimitOutcome>,
    identity: Option<Identity>,
    decision: Decision,
    response_headers: HeaderMap,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context for `method` and `path` with a fresh request ID.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: path.into(),
            query: None,
            categories: CategorySet::empty(),
            bucket: None,
            rate_limit: None,
            identity: None,
            decision: Decision::Continue,
            response_headers: HeaderMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Creates a context from an inbound request.
    ///
    /// Propagates a well-formed inbound `x-request-id`; a missing or
    /// malformed one is replaced by a fresh ID.
    pub fn from_request<B>(request: &http::Request<B>) -> Self {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(RequestId::parse)
            .unwrap_or_default();

        let mut ctx = Self::new(request.method().clone(), request.uri().path());
        ctx.request_id = request_id;
        ctx.query = request.uri().query().map(String::from);
        ctx
    }

    /// Returns a new context with the specified request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns a new context with the specified raw query string.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Returns a new context with the classified route categories.
    #[must_use]
    pub fn with_categories(mut self, categories: CategorySet) -> Self {
        self.categories = categories;
        self
    }

    /// Returns a new context with the rate-limit verdict and its bucket.
    #[must_use]
    pub fn with_rate_limit(mut self, bucket: impl Into<String>, outcome: RateLimitOutcome) -> Self {
        self.bucket = Some(bucket.into());
        self.rate_limit = Some(outcome);
        self
    }

    /// Returns a new context with the resolved identity (`None` = anonymous).
    #[must_use]
    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    /// Returns a new context carrying `decision`, unless a terminal
    /// decision was already recorded, in which case it is kept.
    #[must_use]
    pub fn with_decision(mut self, decision: Decision) -> Self {
        if !self.decision.is_terminal() {
            self.decision = decision;
        }
        self
    }

    /// Returns a new context with `headers` merged into the pending
    /// response headers. Later values replace earlier ones per name.
    #[must_use]
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        merge_headers(&mut self.response_headers, headers);
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (no query string).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the classified route categories.
    #[must_use]
    pub const fn categories(&self) -> CategorySet {
        self.categories
    }

    /// Returns the selected rate-limit bucket, if the path is an API path.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Returns the rate-limit verdict, if the path is an API path.
    #[must_use]
    pub const fn rate_limit(&self) -> Option<&RateLimitOutcome> {
        self.rate_limit.as_ref()
    }

    /// Returns the resolved identity, or `None` for anonymous callers.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Returns the current decision.
    #[must_use]
    pub const fn decision(&self) -> &Decision {
        &self.decision
    }

    /// Returns true once a terminal decision has been recorded.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.decision.is_terminal()
    }

    /// Returns the headers accumulated so far.
    #[must_use]
    pub const fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Consumes the context, returning its decision and accumulated headers.
    #[must_use]
    pub fn into_parts(self) -> (Decision, HeaderMap) {
        (self.decision, self.response_headers)
    }

    /// Returns the elapsed time since the request entered the gateway.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

/// Merges `src` into `dst`, replacing any existing values per header name.
///
/// Multi-valued headers in `src` keep all their values.
pub fn merge_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for name in src.keys() {
        dst.remove(name);
        for value in src.get_all(name) {
            dst.append(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{KycStatus, Role};
    use crate::route::RouteCategory;
    use http::header::{CACHE_CONTROL, SET_COOKIE};
    use http::{HeaderValue, StatusCode};

    #[test]
    fn test_request_id_new_generates_unique_ids() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2, "Each RequestId should be unique");
    }

    #[test]
    fn test_request_id_display() {
        let display = RequestId::new().to_string();
        assert_eq!(display.len(), 36, "UUID string should be 36 characters");
    }

    #[test]
    fn test_request_id_parse() {
        let id = RequestId::new();
        assert_eq!(RequestId::parse(&id.to_string()), Some(id));
        assert_eq!(RequestId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_from_request_reads_path_and_query() {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/login?from=%2Fportfolio")
            .body(())
            .unwrap();
        let ctx = RequestContext::from_request(&request);

        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.path(), "/login");
        assert_eq!(ctx.query(), Some("from=%2Fportfolio"));
        assert!(ctx.categories().is_empty());
        assert!(ctx.identity().is_none());
        assert!(!ctx.is_terminal());
    }

    #[test]
    fn test_from_request_propagates_request_id() {
        let id = RequestId::new();
        let request = http::Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, id.to_string())
            .body(())
            .unwrap();
        assert_eq!(RequestContext::from_request(&request).request_id(), id);

        let request = http::Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, "garbage")
            .body(())
            .unwrap();
        assert_ne!(RequestContext::from_request(&request).request_id(), id);
    }

    #[test]
    fn test_terminal_decision_is_sticky() {
        let ctx = RequestContext::new(Method::GET, "/api/x")
            .with_decision(Decision::reject(StatusCode::TOO_MANY_REQUESTS, serde_json::json!({})))
            .with_decision(Decision::redirect("/login"));

        assert_eq!(ctx.decision().status(), Some(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn test_builder_fields() {
        let identity = Identity::new("u1", Role::User, KycStatus::Verified, 10);
        let ctx = RequestContext::new(Method::GET, "/api/search")
            .with_categories(
                [RouteCategory::Api, RouteCategory::ApiSearch].into_iter().collect(),
            )
            .with_rate_limit("search", RateLimitOutcome::allowed(10, 9, 60))
            .with_identity(Some(identity.clone()));

        assert_eq!(ctx.bucket(), Some("search"));
        assert_eq!(ctx.rate_limit().map(|o| o.remaining), Some(9));
        assert_eq!(ctx.identity(), Some(&identity));
        assert!(ctx.categories().contains(RouteCategory::ApiSearch));
    }

    #[test]
    fn test_merge_headers_replaces_per_name() {
        let mut dst = HeaderMap::new();
        dst.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

        let mut src = HeaderMap::new();
        src.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=60"));
        src.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        src.append(SET_COOKIE, HeaderValue::from_static("b=2"));

        merge_headers(&mut dst, &src);

        assert_eq!(dst.get(CACHE_CONTROL).unwrap(), "public, max-age=60");
        assert_eq!(dst.get_all(SET_COOKIE).iter().count(), 2);
    }
}
