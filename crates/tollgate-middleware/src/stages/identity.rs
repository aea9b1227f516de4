//! Identity resolution stage.
//!
//! Looks for a signed session token in the session cookie, then in an
//! `Authorization: Bearer` header, and asks the [`SessionVerifier`] for its
//! claims. Every failure (no token, bad signature, unknown KYC status,
//! expired session, verifier error or timeout) leaves the caller anonymous.

use std::sync::Arc;
use std::time::Duration;

use http::header::{AUTHORIZATION, COOKIE};
use tollgate_config::IdentityConfig;
use tollgate_core::{Identity, RequestContext};

use super::{call_collaborator, report_failure};
use crate::collaborators::{Clock, SessionVerifier};
use crate::pipeline::{BoxFuture, Phase, Stage};
use crate::types::Request;

const COLLABORATOR: &str = "session_verifier";

/// Identity resolution stage.
pub struct IdentityStage {
    verifier: Arc<dyn SessionVerifier>,
    cookie_name: String,
    accept_bearer: bool,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl IdentityStage {
    /// Creates the stage from the `identity` configuration section.
    pub fn from_config(
        verifier: Arc<dyn SessionVerifier>,
        config: &IdentityConfig,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            cookie_name: config.cookie_name.clone(),
            accept_bearer: config.accept_bearer,
            timeout,
            clock,
        }
    }

    /// Extracts the raw session token, if any.
    #[must_use]
    pub fn session_token<'r>(&self, request: &'r Request) -> Option<&'r str> {
        cookie_value(request, &self.cookie_name)
            .or_else(|| self.accept_bearer.then(|| bearer_token(request)).flatten())
    }

    async fn resolve(&self, ctx: &RequestContext, request: &Request) -> Option<Identity> {
        let token = self.session_token(request)?;

        let call = self.verifier.verify(token);
        let session = match call_collaborator(COLLABORATOR, self.timeout, call).await {
            Ok(session) => session?,
            Err(error) => {
                report_failure(ctx, COLLABORATOR, &error, "anonymous");
                return None;
            }
        };

        let identity = match Identity::try_from(session) {
            Ok(identity) => identity,
            Err(error) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    error = %error,
                    "discarding session with invalid claims"
                );
                return None;
            }
        };

        if identity.is_expired_at(self.clock.now_epoch_secs()) {
            tracing::debug!(
                request_id = %ctx.request_id(),
                subject = %identity.log_id(),
                "discarding expired session"
            );
            return None;
        }
        Some(identity)
    }
}

impl Stage for IdentityStage {
    fn phase(&self) -> Phase {
        Phase::Identity
    }

    fn run<'a>(&'a self, ctx: RequestContext, request: &'a Request) -> BoxFuture<'a, RequestContext> {
        Box::pin(async move {
            let identity = self.resolve(&ctx, request).await;
            ctx.with_identity(identity)
        })
    }
}

/// Returns the value of cookie `name` across all `Cookie` headers.
fn cookie_value<'r>(request: &'r Request, name: &str) -> Option<&'r str> {
    request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}

fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
