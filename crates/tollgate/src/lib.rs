//! # Tollgate
//!
//! **Inbound request policy gateway**
//!
//! Tollgate sits in front of a web application and decides, for every
//! request, whether to let it through, redirect it, or reject it:
//!
//! - **Rate limiting** per API bucket, fail closed
//! - **CSRF protection** for state-changing requests
//! - **Cache policy** for static assets and API responses
//! - **Session identity** resolution, fail open to anonymous
//! - **Authorization** through an ordered decision table
//! - **Security headers** on every response, per environment
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tollgate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_defaults()
//!         .with_optional_file("tollgate.toml")?
//!         .with_env_prefix("TOLLGATE")
//!         .load()?;
//!
//!     let gateway = tollgate::start(
//!         &config,
//!         Collaborators::new(rate_limiter, csrf_validator, session_verifier),
//!     )?;
//!
//!     let response = gateway.process(request, |req, ctx| app.call(req, ctx)).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → classify → RateLimit → Csrf → CachePolicy → Identity → Authorization
//!                                                                        ↓
//! Forward / Respond ←────────────────────────────────────── SecurityHeaders
//! ```

#![doc(html_root_url = "https://docs.rs/tollgate/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod startup;

pub use startup::{assemble, start, StartupError};

// Re-export core types
pub use tollgate_core as core;

// Re-export configuration
pub use tollgate_config as config;

// Re-export telemetry
pub use tollgate_telemetry as telemetry;

// Re-export pipeline and gateway
pub use tollgate_middleware as middleware;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use tollgate::prelude::*;
/// ```
pub mod prelude {
    pub use tollgate_core::{
        CategorySet, Decision, Environment, GatewayError, GatewayResult, Identity, KycStatus,
        RateLimitOutcome, RequestContext, RequestId, Role, RouteCategory, RouteTable,
        VerifiedSession,
    };

    pub use tollgate_config::{ConfigError, ConfigLoader, GatewayConfig};

    pub use tollgate_middleware::{
        Clock, Collaborators, CsrfValidator, Gateway, GatewayOutcome, RateLimiter, Request,
        Response, ResponseExt, SessionVerifier, SystemClock,
    };

    pub use crate::StartupError;
}
