//! # Tollgate Test
//!
//! Test doubles for the gateway collaborators and a fluent request builder.
//!
//! - **Fakes**: in-memory [`RateLimiter`](tollgate_middleware::RateLimiter),
//!   [`CsrfValidator`](tollgate_middleware::CsrfValidator) and
//!   [`SessionVerifier`](tollgate_middleware::SessionVerifier)
//! - **Slow collaborators**: any fake can be delayed with [`Delay`]
//! - **Deterministic time**: [`FixedClock`]
//!
//! ## Example
//!
//! ```ignore
//! use tollgate_test::{session, FakeCsrfValidator, FakeRateLimiter, FakeSessionVerifier, TestRequest};
//!
//! #[tokio::test]
//! async fn admin_page_redirects_anonymous_callers() {
//!     let collaborators = Collaborators::new(
//!         FakeRateLimiter::allowing().shared(),
//!         FakeCsrfValidator::accepting_token("csrf").shared(),
//!         FakeSessionVerifier::new().shared(),
//!     );
//!     let gateway = Gateway::from_config(&GatewayConfig::default(), collaborators)?;
//!
//!     let request = TestRequest::get("/admin/settings").build()?;
//!     let outcome = gateway.evaluate(&request).await;
//!     assert!(!outcome.is_forward());
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/tollgate-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod fakes;
mod request;

pub use error::TestError;
pub use fakes::{
    session, Delay, FakeCsrfValidator, FakeRateLimiter, FakeSessionVerifier, FixedClock,
    LimiterCall,
};
pub use request::{TestRequest, TestRequestBuilder, CSRF_HEADER, SESSION_COOKIE};
