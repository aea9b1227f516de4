//! Fixed-order policy pipeline.
//!
//! Every request flows through six stages in a fixed order:
//!
//! 1. **Rate limit** - may reject with 429
//! 2. **CSRF** - may reject with 403
//! 3. **Cache policy** - attaches cache headers, never terminates
//! 4. **Identity** - resolves the caller, never terminates
//! 5. **Authorization** - may redirect or reject
//! 6. **Security headers** - always runs, even after a terminal decision
//!
//! Stages are sorted by [`Phase`] at build time, so registration order does
//! not matter. Once a stage records a terminal decision, phases 1-5 are
//! skipped and only the security-header stage still runs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tollgate_core::RequestContext;

use crate::types::Request;

/// A boxed future, as returned by [`Stage::run`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased stage that can be stored in the pipeline.
pub type BoxedStage = Arc<dyn Stage>;

/// One concern of the gateway pipeline.
///
/// A stage receives the context by value and returns it, possibly enriched
/// with categories, identity, headers, or a decision. Stages never see the
/// response and never fail: collaborator errors are mapped to an outcome
/// inside the stage.
///
/// # Example
///
/// ```ignore
/// impl Stage for CacheStage {
///     fn phase(&self) -> Phase {
///         Phase::CachePolicy
///     }
///
///     fn run<'a>(
///         &'a self,
///         ctx: RequestContext,
///         _request: &'a Request,
///     ) -> BoxFuture<'a, RequestContext> {
///         Box::pin(async move {
///             let headers = self.provider.headers_for(ctx.path());
///             ctx.with_headers(&headers)
///         })
///     }
/// }
/// ```
pub trait Stage: Send + Sync + 'static {
    /// The slot this stage occupies in the fixed order.
    fn phase(&self) -> Phase;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        self.phase().name()
    }

    /// Runs the stage.
    fn run<'a>(&'a self, ctx: RequestContext, request: &'a Request)
        -> BoxFuture<'a, RequestContext>;
}

/// Pipeline phase.
///
/// The discriminant is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Phase {
    /// Phase 1: Rate limiting
    RateLimit = 1,
    /// Phase 2: CSRF validation
    Csrf = 2,
    /// Phase 3: Cache-control headers
    CachePolicy = 3,
    /// Phase 4: Identity resolution
    Identity = 4,
    /// Phase 5: Authorization decision table
    Authorization = 5,
    /// Phase 6: Security headers
    SecurityHeaders = 6,
}

impl Phase {
    /// Returns the phase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Csrf => "csrf",
            Self::CachePolicy => "cache_policy",
            Self::Identity => "identity",
            Self::Authorization => "authorization",
            Self::SecurityHeaders => "security_headers",
        }
    }

    /// Returns all phases in order.
    #[must_use]
    pub const fn all() -> [Phase; 6] {
        [
            Self::RateLimit,
            Self::Csrf,
            Self::CachePolicy,
            Self::Identity,
            Self::Authorization,
            Self::SecurityHeaders,
        ]
    }

    /// Returns true if the phase still runs after a terminal decision.
    #[must_use]
    pub const fn runs_after_terminal(self) -> bool {
        matches!(self, Self::SecurityHeaders)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while assembling a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Two stages claim the same phase.
    #[error("duplicate stage for phase '{0}'")]
    DuplicatePhase(Phase),

    /// No stage was registered for a phase.
    #[error("no stage registered for phase '{0}'")]
    MissingPhase(Phase),

    /// A configured header could not be represented.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name as configured.
        name: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl PipelineError {
    /// Create an invalid header error.
    pub fn invalid_header(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHeader {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// The fixed-order pipeline.
///
/// Immutable after construction; share it behind an `Arc`.
pub struct Pipeline {
    stages: Vec<BoxedStage>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs every stage in phase order.
    ///
    /// After a terminal decision only phases that
    /// [run after terminal](Phase::runs_after_terminal) execute.
    pub async fn run(&self, mut ctx: RequestContext, request: &Request) -> RequestContext {
        for stage in &self.stages {
            if ctx.is_terminal() && !stage.phase().runs_after_terminal() {
                tracing::trace!(
                    request_id = %ctx.request_id(),
                    stage = stage.name(),
                    "skipping stage after terminal decision"
                );
                continue;
            }
            ctx = stage.run(ctx, request).await;
        }
        ctx
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the phases in execution order.
    #[must_use]
    pub fn phases(&self) -> Vec<Phase> {
        self.stages.iter().map(|s| s.phase()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedStage>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stage. Order of registration is irrelevant.
    #[must_use]
    pub fn stage<S: Stage>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Registers an already shared stage.
    #[must_use]
    pub fn boxed_stage(mut self, stage: BoxedStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` if a phase is claimed twice or left empty.
    pub fn build(mut self) -> Result<Pipeline, PipelineError> {
        self.stages.sort_by_key(|s| s.phase());

        for pair in self.stages.windows(2) {
            if pair[0].phase() == pair[1].phase() {
                return Err(PipelineError::DuplicatePhase(pair[0].phase()));
            }
        }
        for phase in Phase::all() {
            if !self.stages.iter().any(|s| s.phase() == phase) {
                return Err(PipelineError::MissingPhase(phase));
            }
        }

        Ok(Pipeline {
            stages: self.stages,
        })
    }
}
