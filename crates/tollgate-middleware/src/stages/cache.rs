//! Cache policy stage.
//!
//! Static assets are cached for a year, API responses are never cached.
//! The stage never terminates and runs regardless of what authorization
//! later decides.

use std::sync::Arc;

use http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use http::{HeaderMap, HeaderName, HeaderValue};
use tollgate_config::CacheConfig;
use tollgate_core::route::prefix_matches;
use tollgate_core::{RequestContext, RouteCategory, RouteTable};

use crate::collaborators::CacheHeaderProvider;
use crate::pipeline::{BoxFuture, Phase, PipelineError, Stage};
use crate::types::Request;

/// Configuration-backed [`CacheHeaderProvider`].
#[derive(Debug, Clone)]
pub struct StaticCachePolicy {
    routes: Arc<RouteTable>,
    api_prefix: String,
    static_headers: HeaderMap,
    api_headers: HeaderMap,
}

impl StaticCachePolicy {
    /// Builds the policy from the `cache` section and the route table.
    ///
    /// A path is an API path if the table gives it an API category or it
    /// falls under `cache.api_prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidHeader`] if a configured value is not
    /// a valid header value.
    pub fn from_config(config: &CacheConfig, routes: Arc<RouteTable>) -> Result<Self, PipelineError> {
        let mut static_headers = HeaderMap::new();
        static_headers.insert(CACHE_CONTROL, header_value(&CACHE_CONTROL, &config.static_cache_control)?);

        let mut api_headers = HeaderMap::new();
        api_headers.insert(CACHE_CONTROL, header_value(&CACHE_CONTROL, &config.api_cache_control)?);
        api_headers.insert(PRAGMA, header_value(&PRAGMA, &config.api_pragma)?);
        api_headers.insert(EXPIRES, header_value(&EXPIRES, &config.api_expires)?);

        Ok(Self {
            routes,
            api_prefix: config.api_prefix.clone(),
            static_headers,
            api_headers,
        })
    }
}

impl CacheHeaderProvider for StaticCachePolicy {
    fn headers_for(&self, path: &str) -> HeaderMap {
        let categories = self.routes.classify(path);
        if categories.contains(RouteCategory::StaticAsset) {
            self.static_headers.clone()
        } else if categories.is_api() || prefix_matches(&self.api_prefix, path) {
            self.api_headers.clone()
        } else {
            HeaderMap::new()
        }
    }
}

fn header_value(name: &HeaderName, value: &str) -> Result<HeaderValue, PipelineError> {
    HeaderValue::from_str(value).map_err(|e| PipelineError::invalid_header(name.as_str(), e.to_string()))
}

/// Cache policy stage.
pub struct CacheStage {
    provider: Arc<dyn CacheHeaderProvider>,
}

impl CacheStage {
    /// Creates the stage.
    pub fn new(provider: Arc<dyn CacheHeaderProvider>) -> Self {
        Self { provider }
    }
}

impl Stage for CacheStage {
    fn phase(&self) -> Phase {
        Phase::CachePolicy
    }

    fn run<'a>(&'a self, ctx: RequestContext, _request: &'a Request) -> BoxFuture<'a, RequestContext> {
        Box::pin(async move {
            let headers = self.provider.headers_for(ctx.path());
            if headers.is_empty() {
                return ctx;
            }
            ctx.with_headers(&headers)
        })
    }
}
