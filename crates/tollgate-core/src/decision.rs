//! Pipeline decisions and rate-limit outcomes.

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// The outcome the pipeline has reached for a request.
///
/// Once a terminal decision ([`Reject`](Self::Reject) or
/// [`Redirect`](Self::Redirect)) is recorded on a
/// [`RequestContext`](crate::RequestContext) it can no longer be replaced.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Decision {
    /// Let the request through to the application.
    #[default]
    Continue,
    /// Answer with an error status and JSON body.
    Reject {
        /// HTTP status (401, 403, 429).
        status: StatusCode,
        /// JSON response body.
        body: serde_json::Value,
    },
    /// Send the caller elsewhere.
    Redirect {
        /// Target location (path plus query).
        location: String,
    },
}

impl Decision {
    /// Creates a rejection.
    pub fn reject(status: StatusCode, body: serde_json::Value) -> Self {
        Self::Reject { status, body }
    }

    /// Creates a redirect.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
        }
    }

    /// Returns true unless this is [`Decision::Continue`].
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Continue)
    }

    /// Returns the redirect location, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Redirect { location } => Some(location),
            _ => None,
        }
    }

    /// Returns the rejection status, if any.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Reject { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the payload-free kind of this decision.
    #[must_use]
    pub const fn kind(&self) -> DecisionKind {
        match self {
            Self::Continue => DecisionKind::Continue,
            Self::Reject { .. } => DecisionKind::Reject,
            Self::Redirect { .. } => DecisionKind::Redirect,
        }
    }
}

/// Payload-free discriminant of a [`Decision`], used in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Request forwarded.
    Continue,
    /// Request rejected.
    Reject,
    /// Request redirected.
    Redirect,
}

impl DecisionKind {
    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Reject => "reject",
            Self::Redirect => "redirect",
        }
    }
}

/// Verdict returned by the rate limiter for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOutcome {
    /// Whether the request fits in the bucket.
    pub allowed: bool,
    /// Bucket capacity per window.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// When the window resets, as Unix epoch seconds.
    #[serde(rename = "resetAtEpochSeconds")]
    pub reset_at: u64,
}

impl RateLimitOutcome {
    /// An allowed outcome.
    #[must_use]
    pub const fn allowed(limit: u64, remaining: u64, reset_at: u64) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_at,
        }
    }

    /// A rejected outcome.
    #[must_use]
    pub const fn limited(limit: u64, reset_at: u64) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at,
        }
    }

    /// The fail-closed outcome used when the limiter cannot be reached.
    #[must_use]
    pub const fn unavailable(now: u64) -> Self {
        Self::limited(0, now)
    }

    /// Seconds until reset relative to `now`, never less than one.
    #[must_use]
    pub fn retry_after(&self, now: u64) -> u64 {
        self.reset_at.saturating_sub(now).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_kinds() {
        assert!(!Decision::Continue.is_terminal());
        assert!(Decision::redirect("/login").is_terminal());

        let reject = Decision::reject(StatusCode::FORBIDDEN, serde_json::json!({"error": "no"}));
        assert_eq!(reject.kind(), DecisionKind::Reject);
        assert_eq!(reject.status(), Some(StatusCode::FORBIDDEN));
        assert!(reject.location().is_none());
    }

    #[test]
    fn test_redirect_location() {
        let decision = Decision::redirect("/dashboard");
        assert_eq!(decision.location(), Some("/dashboard"));
        assert_eq!(decision.kind().as_str(), "redirect");
    }

    #[test]
    fn test_retry_after_floor() {
        let outcome = RateLimitOutcome::limited(10, 100);
        assert_eq!(outcome.retry_after(40), 60);
        assert_eq!(outcome.retry_after(100), 1);
        assert_eq!(outcome.retry_after(500), 1);
    }

    #[test]
    fn test_unavailable_is_not_allowed() {
        let outcome = RateLimitOutcome::unavailable(1_000);
        assert!(!outcome.allowed);
        assert_eq!(outcome.remaining, 0);
        assert_eq!(outcome.reset_at, 1_000);
    }

    #[test]
    fn test_outcome_wire_names() {
        let json = serde_json::to_value(RateLimitOutcome::allowed(5, 4, 9)).unwrap();
        assert_eq!(json["resetAtEpochSeconds"], 9);
        assert_eq!(json["remaining"], 4);
    }
}
