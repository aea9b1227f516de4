//! # Tollgate Core
//!
//! Core types for the Tollgate inbound request policy gateway.
//!
//! This crate provides the data model shared by every gateway stage:
//!
//! - [`RouteCategory`] / [`CategorySet`] - Security classification of a path
//! - [`RouteTable`] - The prefix table that classifies paths
//! - [`Identity`] - A verified caller session (subject, role, KYC status)
//! - [`RateLimitOutcome`] - The verdict of a rate-limit check
//! - [`Decision`] - The terminal or continuing outcome of the pipeline
//! - [`RequestContext`] - Per-request state passed from stage to stage
//! - [`GatewayError`] - Collaborator failure taxonomy

#![doc(html_root_url = "https://docs.rs/tollgate-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod decision;
mod environment;
mod error;
mod identity;
pub mod route;

pub use context::{merge_headers, RequestContext, RequestId, REQUEST_ID_HEADER};
pub use decision::{Decision, DecisionKind, RateLimitOutcome};
pub use environment::Environment;
pub use error::{GatewayError, GatewayResult};
pub use identity::{Identity, KycStatus, Role, VerifiedSession};
pub use route::{CategorySet, RouteCategory, RouteRule, RouteTable};
