//! In-memory collaborators.
//!
//! Each fake records how often it was called, can be slowed down with a
//! [`Delay`], and can be switched to return an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tollgate_core::{GatewayError, GatewayResult, RateLimitOutcome, VerifiedSession};
use tollgate_middleware::{Clock, CsrfValidator, RateLimiter, Request, SessionVerifier};

use crate::request::CSRF_HEADER;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How long a fake takes to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delay {
    /// Answer immediately.
    #[default]
    None,
    /// Sleep before answering.
    For(Duration),
    /// Never answer.
    Forever,
}

impl Delay {
    async fn wait(self) {
        match self {
            Self::None => {}
            Self::For(duration) => tokio::time::sleep(duration).await,
            Self::Forever => std::future::pending::<()>().await,
        }
    }
}

/// Counts calls that have started but not yet completed or been dropped.
#[derive(Debug, Default)]
struct InFlight(AtomicUsize);

struct InFlightGuard<'a>(&'a InFlight);

impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(self)
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0 .0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One recorded limiter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterCall {
    /// Bucket name.
    pub bucket: String,
    /// Caller fingerprint.
    pub fingerprint: String,
}

/// Fake [`RateLimiter`].
///
/// By default every request is allowed. [`counting`](Self::counting) turns
/// it into a fixed-window limiter keyed by bucket and fingerprint.
#[derive(Debug)]
pub struct FakeRateLimiter {
    outcomes: HashMap<String, RateLimitOutcome>,
    fallback: RateLimitOutcome,
    capacity: Option<(u64, u64)>,
    used: Mutex<HashMap<(String, String), u64>>,
    calls: Mutex<Vec<LimiterCall>>,
    delay: Delay,
    failure: Option<String>,
    in_flight: InFlight,
}

impl FakeRateLimiter {
    /// A limiter that allows everything.
    #[must_use]
    pub fn allowing() -> Self {
        Self::with_fallback(RateLimitOutcome::allowed(100, 99, 4_102_444_800))
    }

    /// A limiter that rejects everything, resetting at `reset_at`.
    #[must_use]
    pub fn rejecting(limit: u64, reset_at: u64) -> Self {
        Self::with_fallback(RateLimitOutcome::limited(limit, reset_at))
    }

    /// A fixed-window limiter allowing `limit` calls per bucket and
    /// fingerprint until `reset_at`.
    #[must_use]
    pub fn counting(limit: u64, reset_at: u64) -> Self {
        Self {
            capacity: Some((limit, reset_at)),
            ..Self::allowing()
        }
    }

    fn with_fallback(fallback: RateLimitOutcome) -> Self {
        Self {
            outcomes: HashMap::new(),
            fallback,
            capacity: None,
            used: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: Delay::None,
            failure: None,
            in_flight: InFlight::default(),
        }
    }

    /// Returns `outcome` for `bucket`.
    #[must_use]
    pub fn with_outcome(mut self, bucket: impl Into<String>, outcome: RateLimitOutcome) -> Self {
        self.outcomes.insert(bucket.into(), outcome);
        self
    }

    /// Delays every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    /// Fails every call with [`GatewayError::Unavailable`].
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Wraps the fake in an `Arc`.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> Vec<LimiterCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Calls started but not finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    fn outcome_for(&self, bucket: &str, fingerprint: &str) -> RateLimitOutcome {
        if let Some((limit, reset_at)) = self.capacity {
            let mut used = lock(&self.used);
            let count = used
                .entry((bucket.to_string(), fingerprint.to_string()))
                .or_insert(0);
            *count += 1;
            return if *count <= limit {
                RateLimitOutcome::allowed(limit, limit - *count, reset_at)
            } else {
                RateLimitOutcome::limited(limit, reset_at)
            };
        }
        self.outcomes.get(bucket).copied().unwrap_or(self.fallback)
    }
}

impl Default for FakeRateLimiter {
    fn default() -> Self {
        Self::allowing()
    }
}

#[async_trait]
impl RateLimiter for FakeRateLimiter {
    async fn check(&self, bucket: &str, fingerprint: &str) -> GatewayResult<RateLimitOutcome> {
        let _guard = self.in_flight.enter();
        lock(&self.calls).push(LimiterCall {
            bucket: bucket.to_string(),
            fingerprint: fingerprint.to_string(),
        });
        self.delay.wait().await;
        if let Some(message) = &self.failure {
            return Err(GatewayError::unavailable("rate_limiter", message.clone()));
        }
        Ok(self.outcome_for(bucket, fingerprint))
    }
}

/// Fake [`CsrfValidator`] that compares the `x-csrf-token` header.
#[derive(Debug)]
pub struct FakeCsrfValidator {
    token: Option<String>,
    calls: AtomicUsize,
    delay: Delay,
    failure: Option<String>,
    in_flight: InFlight,
}

impl FakeCsrfValidator {
    /// Accepts requests whose CSRF header equals `token`.
    #[must_use]
    pub fn accepting_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::rejecting_all()
        }
    }

    /// Rejects every request.
    #[must_use]
    pub fn rejecting_all() -> Self {
        Self {
            token: None,
            calls: AtomicUsize::new(0),
            delay: Delay::None,
            failure: None,
            in_flight: InFlight::default(),
        }
    }

    /// Delays every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    /// Fails every call with [`GatewayError::Unavailable`].
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Wraps the fake in an `Arc`.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls started but not finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }
}

#[async_trait]
impl CsrfValidator for FakeCsrfValidator {
    async fn validate_request(&self, request: &Request) -> GatewayResult<bool> {
        let _guard = self.in_flight.enter();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.delay.wait().await;
        if let Some(message) = &self.failure {
            return Err(GatewayError::unavailable("csrf_validator", message.clone()));
        }
        let presented = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok());
        Ok(matches!((presented, &self.token), (Some(p), Some(t)) if p == t))
    }
}

/// Fake [`SessionVerifier`] backed by a token map.
#[derive(Debug, Default)]
pub struct FakeSessionVerifier {
    sessions: HashMap<String, VerifiedSession>,
    calls: AtomicUsize,
    delay: Delay,
    failure: Option<String>,
    in_flight: InFlight,
}

impl FakeSessionVerifier {
    /// A verifier that knows no tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `token` with the given claims.
    #[must_use]
    pub fn with_session(mut self, token: impl Into<String>, session: VerifiedSession) -> Self {
        self.sessions.insert(token.into(), session);
        self
    }

    /// Delays every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    /// Fails every call with [`GatewayError::Unavailable`].
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Wraps the fake in an `Arc`.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls started but not finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }
}

#[async_trait]
impl SessionVerifier for FakeSessionVerifier {
    async fn verify(&self, raw_token: &str) -> GatewayResult<Option<VerifiedSession>> {
        let _guard = self.in_flight.enter();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.delay.wait().await;
        if let Some(message) = &self.failure {
            return Err(GatewayError::unavailable("session_verifier", message.clone()));
        }
        Ok(self.sessions.get(raw_token).cloned())
    }
}

/// A [`Clock`] that only moves when told to.
#[derive(Debug)]
pub struct FixedClock(AtomicU64);

impl FixedClock {
    /// Starts the clock at `epoch_secs`.
    #[must_use]
    pub fn new(epoch_secs: u64) -> Self {
        Self(AtomicU64::new(epoch_secs))
    }

    /// Sets the time.
    pub fn set(&self, epoch_secs: u64) {
        self.0.store(epoch_secs, Ordering::SeqCst);
    }

    /// Moves the time forward.
    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_epoch_secs(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Session claims for tests.
pub fn session(
    subject_id: impl Into<String>,
    role: &str,
    kyc_status: &str,
    expires_at: u64,
) -> VerifiedSession {
    VerifiedSession {
        subject_id: subject_id.into(),
        role: role.to_string(),
        kyc_status: kyc_status.to_string(),
        expires_at_epoch_seconds: expires_at,
    }
}
