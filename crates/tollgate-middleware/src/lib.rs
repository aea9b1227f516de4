//! # Tollgate Middleware
//!
//! The fixed-order policy pipeline and the gateway that drives it.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Request → classify → RateLimit → Csrf → CachePolicy → Identity → Authorization
//!                                                                        ↓
//! Forward / Respond ←────────────────────────────────────── SecurityHeaders
//! ```
//!
//! | Phase | Stage             | May terminate with      |
//! |-------|-------------------|-------------------------|
//! | 1     | Rate limit        | 429                     |
//! | 2     | CSRF              | 403                     |
//! | 3     | Cache policy      | never                   |
//! | 4     | Identity          | never                   |
//! | 5     | Authorization     | 307 redirect, 401, 403  |
//! | 6     | Security headers  | never (always runs)     |
//!
//! Once a stage terminates, the remaining stages are skipped except for
//! security headers, which are attached to every response.
//!
//! ## Example
//!
//! ```
//! use tollgate_middleware::pipeline::Phase;
//!
//! let phases = Phase::all();
//! assert_eq!(phases.len(), 6);
//! assert_eq!(phases[0].name(), "rate_limit");
//! assert!(phases[5].runs_after_terminal());
//! ```

#![doc(html_root_url = "https://docs.rs/tollgate-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod collaborators;
pub mod gateway;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use collaborators::{
    client_ip, default_fingerprint, CacheHeaderProvider, Clock, CsrfValidator, RateLimiter,
    SecurityHeaderProvider, SessionVerifier, SystemClock,
};
pub use gateway::{Collaborators, Gateway, GatewayOutcome};
pub use pipeline::{BoxFuture, BoxedStage, Phase, Pipeline, PipelineBuilder, PipelineError, Stage};
pub use types::{Request, Response, ResponseExt};
