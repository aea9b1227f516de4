//! End-to-end gateway scenarios built on the `tollgate-test` doubles.

use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use http_body_util::BodyExt;
use tollgate_config::GatewayConfig;
use tollgate_core::{DecisionKind, RateLimitOutcome, RouteCategory, RouteRule, REQUEST_ID_HEADER};
use tollgate_middleware::{Collaborators, Gateway, GatewayOutcome, Request, Response};
use tollgate_test::{
    session, Delay, FakeCsrfValidator, FakeRateLimiter, FakeSessionVerifier, FixedClock,
    TestRequest,
};

const NOW: u64 = 1_700_000_000;
const CSRF: &str = "csrf-ok";

struct Harness {
    gateway: Arc<Gateway>,
    limiter: Arc<FakeRateLimiter>,
    csrf: Arc<FakeCsrfValidator>,
    sessions: Arc<FakeSessionVerifier>,
}

fn sessions() -> FakeSessionVerifier {
    FakeSessionVerifier::new()
        .with_session("user-token", session("u-1", "USER", "VERIFIED", NOW + 3_600))
        .with_session("pending-token", session("u-2", "USER", "PENDING", NOW + 3_600))
        .with_session("admin-token", session("u-3", "ADMIN", "VERIFIED", NOW + 3_600))
        .with_session("stale-token", session("u-4", "USER", "VERIFIED", NOW - 1))
}

fn harness_with(
    limiter: FakeRateLimiter,
    csrf: FakeCsrfValidator,
    sessions: FakeSessionVerifier,
) -> Harness {
    let limiter = limiter.shared();
    let csrf = csrf.shared();
    let sessions = sessions.shared();
    let collaborators = Collaborators::new(limiter.clone(), csrf.clone(), sessions.clone())
        .with_clock(Arc::new(FixedClock::new(NOW)));
    let gateway = Gateway::from_config(&GatewayConfig::default(), collaborators).unwrap();
    Harness {
        gateway: Arc::new(gateway),
        limiter,
        csrf,
        sessions,
    }
}

fn harness() -> Harness {
    harness_with(
        FakeRateLimiter::allowing(),
        FakeCsrfValidator::accepting_token(CSRF),
        sessions(),
    )
}

fn respond(outcome: GatewayOutcome) -> Response {
    match outcome {
        GatewayOutcome::Respond(response) => response,
        GatewayOutcome::Forward { context, .. } => {
            panic!("expected a direct response, forwarded {}", context.path())
        }
    }
}

fn location(response: &Response) -> &str {
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    response.headers()["location"].to_str().unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(path: &str) -> Request {
    TestRequest::get(path).build().unwrap()
}

#[tokio::test]
async fn unmatched_path_is_allowed() {
    let h = harness();
    match h.gateway.evaluate(&get("/no/such/page")).await {
        GatewayOutcome::Forward { headers, context } => {
            assert!(context.categories().is_empty());
            assert!(context.identity().is_none());
            assert!(headers.contains_key(REQUEST_ID_HEADER));
            assert!(headers.contains_key("content-security-policy"));
        }
        GatewayOutcome::Respond(r) => panic!("unexpected {}", r.status()),
    }
    assert_eq!(h.limiter.call_count(), 0);
}

#[tokio::test]
async fn auth_api_always_uses_auth_bucket() {
    let h = harness();
    for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
        let request = tollgate_test::TestRequestBuilder::new(method, "/api/auth/session")
            .csrf_token(CSRF)
            .build()
            .unwrap();
        assert!(h.gateway.evaluate(&request).await.is_forward());
    }
    assert!(h.limiter.calls().iter().all(|call| call.bucket == "auth"));
    assert_eq!(h.limiter.call_count(), 4);
}

#[tokio::test]
async fn missing_or_invalid_csrf_is_always_403() {
    let h = harness();
    let requests = [
        TestRequest::post("/api/transaction/create").build().unwrap(),
        TestRequest::post("/api/transaction/create")
            .csrf_token("forged")
            .session("user-token")
            .build()
            .unwrap(),
        TestRequest::delete("/settings")
            .session("admin-token")
            .build()
            .unwrap(),
    ];

    for request in requests {
        let response = respond(h.gateway.evaluate(&request).await);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().contains_key("x-frame-options"));
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"error": "CSRF token validation failed"})
        );
    }
    assert_eq!(h.sessions.call_count(), 0);
}

#[tokio::test]
async fn rate_limited_response_carries_headers_and_body() {
    let h = harness_with(
        FakeRateLimiter::rejecting(10, NOW + 30),
        FakeCsrfValidator::accepting_token(CSRF),
        sessions(),
    );

    let request = TestRequest::post("/api/search")
        .csrf_token(CSRF)
        .forwarded_for("198.51.100.4")
        .build()
        .unwrap();
    let response = respond(h.gateway.evaluate(&request).await);

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let headers = response.headers();
    assert_eq!(headers["x-ratelimit-limit"], "10");
    assert_eq!(headers["x-ratelimit-remaining"], "0");
    assert_eq!(headers["x-ratelimit-reset"], (NOW + 30).to_string().as_str());
    assert_eq!(headers["retry-after"], "30");
    assert!(headers.contains_key("strict-transport-security"));
    assert!(headers.contains_key(REQUEST_ID_HEADER));

    assert_eq!(h.limiter.calls()[0].fingerprint, "198.51.100.4:/api/search");
    assert_eq!(h.csrf.call_count(), 0);

    let body = json_body(response).await;
    assert_eq!(body["error"], "Too many requests");
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(body["retryAfter"], 30);
}

#[tokio::test]
async fn counting_limiter_rejects_after_capacity() {
    let h = harness_with(
        FakeRateLimiter::counting(2, NOW + 60),
        FakeCsrfValidator::accepting_token(CSRF),
        sessions(),
    );

    let forwarded = forwarded_in_sequence(&h, 3).await;
    assert_eq!(forwarded, vec![true, true, false]);
}

async fn forwarded_in_sequence(h: &Harness, n: usize) -> Vec<bool> {
    let mut forwarded = Vec::with_capacity(n);
    for _ in 0..n {
        let request = TestRequest::get("/api/properties")
            .forwarded_for("203.0.113.5")
            .build()
            .unwrap();
        forwarded.push(h.gateway.evaluate(&request).await.is_forward());
    }
    forwarded
}

#[tokio::test]
async fn identical_requests_yield_identical_decisions() {
    let h = harness();
    let paths = ["/admin/settings", "/dashboard", "/about", "/api/search", "/login"];

    for path in paths {
        let first = decision_kind(h.gateway.evaluate(&get(path)).await);
        let second = decision_kind(h.gateway.evaluate(&get(path)).await);
        assert_eq!(first, second, "{path}");
    }
}

fn decision_kind(outcome: GatewayOutcome) -> DecisionKind {
    match outcome {
        GatewayOutcome::Forward { .. } => DecisionKind::Continue,
        GatewayOutcome::Respond(r) if r.status().is_redirection() => DecisionKind::Redirect,
        GatewayOutcome::Respond(_) => DecisionKind::Reject,
    }
}

#[tokio::test]
async fn admin_without_session_goes_to_login() {
    let h = harness();
    let response = respond(h.gateway.evaluate(&get("/admin/settings")).await);
    assert_eq!(
        location(&response),
        "/login?from=/admin/settings&error=SessionRequired"
    );
    assert!(response.headers().contains_key("x-content-type-options"));
}

#[tokio::test]
async fn admin_with_user_role_goes_to_dashboard() {
    let h = harness();
    let request = TestRequest::get("/admin/settings")
        .session("user-token")
        .build()
        .unwrap();
    let response = respond(h.gateway.evaluate(&request).await);
    assert_eq!(location(&response), "/dashboard");

    let request = TestRequest::get("/admin/settings")
        .session("admin-token")
        .build()
        .unwrap();
    assert!(h.gateway.evaluate(&request).await.is_forward());
}

#[tokio::test]
async fn pending_kyc_goes_to_onboarding() {
    let h = harness();
    let request = TestRequest::get("/properties/invest")
        .session("pending-token")
        .build()
        .unwrap();
    let response = respond(h.gateway.evaluate(&request).await);
    assert_eq!(
        location(&response),
        "/onboarding/kyc?from=/properties/invest&reason=KYCRequired"
    );
}

#[tokio::test]
async fn valid_transaction_is_forwarded() {
    let h = harness();
    let request = TestRequest::post("/api/transaction/create")
        .session("user-token")
        .csrf_token(CSRF)
        .json(&serde_json::json!({"amount": 100}))
        .build()
        .unwrap();

    let response = h
        .gateway
        .process(request, |_req, ctx| async move {
            assert_eq!(ctx.bucket(), Some("transaction"));
            assert_eq!(ctx.identity().unwrap().subject_id(), "u-1");
            let mut response = Response::default();
            *response.status_mut() = StatusCode::CREATED;
            response
        })
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "99");
    assert_eq!(response.headers()["pragma"], "no-cache");
    assert_eq!(h.csrf.call_count(), 1);
}

#[tokio::test]
async fn authenticated_login_page_returns_to_from() {
    let h = harness();
    let request = TestRequest::get("/login?from=/portfolio")
        .session("user-token")
        .build()
        .unwrap();
    let response = respond(h.gateway.evaluate(&request).await);
    assert_eq!(location(&response), "/portfolio");

    let request = TestRequest::get("/login?from=https://evil.example")
        .bearer_token("user-token")
        .build()
        .unwrap();
    let response = respond(h.gateway.evaluate(&request).await);
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn expired_session_is_anonymous() {
    let h = harness();
    let request = TestRequest::get("/portfolio")
        .session("stale-token")
        .build()
        .unwrap();
    let response = respond(h.gateway.evaluate(&request).await);
    assert_eq!(
        location(&response),
        "/login?from=/portfolio&error=SessionRequired"
    );
}

#[tokio::test]
async fn static_assets_get_immutable_cache_headers() {
    let h = harness();
    match h.gateway.evaluate(&get("/_next/static/app.js")).await {
        GatewayOutcome::Forward { headers, .. } => {
            assert_eq!(headers["cache-control"], "public, max-age=31536000, immutable");
        }
        GatewayOutcome::Respond(r) => panic!("unexpected {}", r.status()),
    }
}

#[tokio::test]
async fn configured_api_route_is_rate_limited_and_uncached() {
    let mut config = GatewayConfig::default();
    config
        .routes
        .rules
        .push(RouteRule::new("/graphql", [RouteCategory::Api]));
    let limiter = FakeRateLimiter::allowing().shared();
    let collaborators = Collaborators::new(
        limiter.clone(),
        FakeCsrfValidator::accepting_token(CSRF).shared(),
        sessions().shared(),
    )
    .with_clock(Arc::new(FixedClock::new(NOW)));
    let gateway = Gateway::from_config(&config, collaborators).unwrap();

    match gateway.evaluate(&get("/graphql")).await {
        GatewayOutcome::Forward { headers, context } => {
            assert_eq!(context.bucket(), Some("default"));
            assert!(headers.contains_key("x-ratelimit-limit"));
            assert_eq!(
                headers["cache-control"],
                "no-store, no-cache, must-revalidate, proxy-revalidate"
            );
            assert_eq!(headers["pragma"], "no-cache");
        }
        GatewayOutcome::Respond(r) => panic!("unexpected {}", r.status()),
    }
    assert_eq!(limiter.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_rate_limiter_fails_closed() {
    let h = harness_with(
        FakeRateLimiter::allowing().with_delay(Delay::Forever),
        FakeCsrfValidator::accepting_token(CSRF),
        sessions(),
    );
    let response = respond(h.gateway.evaluate(&get("/api/properties")).await);
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-limit"], "0");
    assert_eq!(json_body(response).await["code"], "RATE_LIMITED");
    assert_eq!(h.limiter.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_csrf_validator_fails_closed() {
    let h = harness_with(
        FakeRateLimiter::allowing(),
        FakeCsrfValidator::accepting_token(CSRF).with_delay(Delay::For(Duration::from_secs(30))),
        sessions(),
    );
    let request = TestRequest::post("/settings").csrf_token(CSRF).build().unwrap();
    let response = respond(h.gateway.evaluate(&request).await);
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test(start_paused = true)]
async fn hanging_session_verifier_fails_open() {
    let h = harness_with(
        FakeRateLimiter::allowing(),
        FakeCsrfValidator::accepting_token(CSRF),
        sessions().with_delay(Delay::Forever),
    );

    // anonymous on a public page: forwarded
    let request = TestRequest::get("/about").session("user-token").build().unwrap();
    match h.gateway.evaluate(&request).await {
        GatewayOutcome::Forward { context, .. } => assert!(context.identity().is_none()),
        GatewayOutcome::Respond(r) => panic!("unexpected {}", r.status()),
    }

    // anonymous on a protected page: login
    let request = TestRequest::get("/wallet").session("user-token").build().unwrap();
    let response = respond(h.gateway.evaluate(&request).await);
    assert!(location(&response).starts_with("/login?from=/wallet"));
}

#[tokio::test]
async fn failing_collaborators_map_to_fallbacks() {
    let h = harness_with(
        FakeRateLimiter::allowing(),
        FakeCsrfValidator::accepting_token(CSRF).failing("redis down"),
        sessions().failing("jwks down"),
    );

    let request = TestRequest::patch("/settings").csrf_token(CSRF).build().unwrap();
    assert_eq!(
        respond(h.gateway.evaluate(&request).await).status(),
        StatusCode::FORBIDDEN
    );

    let request = TestRequest::get("/dashboard").session("user-token").build().unwrap();
    let response = respond(h.gateway.evaluate(&request).await);
    assert!(location(&response).starts_with("/login?"));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_gateway_future_cancels_collaborators() {
    let h = harness_with(
        FakeRateLimiter::allowing(),
        FakeCsrfValidator::accepting_token(CSRF),
        sessions().with_delay(Delay::For(Duration::from_millis(400))),
    );

    let gateway = Arc::clone(&h.gateway);
    let task = tokio::spawn(async move {
        let request = TestRequest::get("/dashboard")
            .session("user-token")
            .build()
            .unwrap();
        gateway.evaluate(&request).await.is_forward()
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.sessions.in_flight(), 1);

    task.abort();
    let joined = task.await;
    assert!(joined.unwrap_err().is_cancelled());
    assert_eq!(h.sessions.in_flight(), 0);
}

#[tokio::test]
async fn per_bucket_outcomes_are_isolated() {
    let h = harness_with(
        FakeRateLimiter::allowing().with_outcome("upload", RateLimitOutcome::limited(5, NOW + 5)),
        FakeCsrfValidator::accepting_token(CSRF),
        sessions(),
    );

    let upload = TestRequest::post("/api/upload/doc").csrf_token(CSRF).build().unwrap();
    assert_eq!(
        respond(h.gateway.evaluate(&upload).await).status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert!(h.gateway.evaluate(&get("/api/search?q=x")).await.is_forward());
}
