//! Typed configuration for the Tollgate policy gateway.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults or preset → files → env)
//!
//! # Example
//!
//! ```no_run
//! use tollgate_config::ConfigLoader;
//!
//! # fn main() -> Result<(), tollgate_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_optional_file("gateway.toml")?
//!     .with_env_prefix("TOLLGATE")
//!     .load()?;
//!
//! let routes = config.route_table();
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [gateway]
//! environment = "staging"
//!
//! [[routes.rules]]
//! prefix = "/admin"
//! categories = ["admin", "protected"]
//!
//! [rate_limit]
//! default_bucket = "default"
//!
//! [[rate_limit.buckets]]
//! category = "api-auth"
//! bucket = "auth"
//!
//! [csrf]
//! exempt_paths = ["/api/csrf", "/api/health"]
//!
//! [identity]
//! cookie_name = "session-token"
//!
//! [security_headers.staging]
//! "X-Robots-Tag" = "noindex"
//!
//! [timeouts]
//! rate_limiter_ms = 250
//! csrf_validator_ms = 250
//! session_verifier_ms = 500
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! Scalar settings can be overridden with `PREFIX__SECTION__KEY` variables,
//! e.g. `TOLLGATE__GATEWAY__ENVIRONMENT=production`.

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::GatewayConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
