//! Test request building.

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use http_body_util::Full;
use serde::Serialize;
use tollgate_core::REQUEST_ID_HEADER;
use tollgate_middleware::Request;

use crate::error::TestError;

/// Default session cookie name.
pub const SESSION_COOKIE: &str = "session-token";

/// Header read by [`FakeCsrfValidator`](crate::FakeCsrfValidator).
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Entry points for building gateway requests.
pub struct TestRequest;

impl TestRequest {
    /// Creates a GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Creates a POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Creates a PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Creates a PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Creates a DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Creates a HEAD request.
    pub fn head(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::HEAD, uri)
    }

    /// Creates an OPTIONS request.
    pub fn options(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::OPTIONS, uri)
    }
}

/// Builder for gateway requests.
///
/// Invalid header names or values are reported by [`build`](Self::build).
#[must_use]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    cookies: Vec<String>,
    body: Bytes,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
            error: None,
        }
    }

    /// Appends a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::try_from(name.as_ref());
        let value = HeaderValue::try_from(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) => self.fail(TestError::InvalidHeader(e.to_string())),
            (_, Err(e)) => self.fail(TestError::InvalidHeader(e.to_string())),
        }
        self
    }

    /// Adds a cookie; all cookies are sent in one `Cookie` header.
    pub fn cookie(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.cookies
            .push(format!("{}={}", name.as_ref(), value.as_ref()));
        self
    }

    /// Sends `token` in the default session cookie.
    pub fn session(self, token: impl AsRef<str>) -> Self {
        self.cookie(SESSION_COOKIE, token)
    }

    /// Sets `Authorization: Bearer <token>`.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header(AUTHORIZATION.as_str(), format!("Bearer {}", token.as_ref()))
    }

    /// Sets the CSRF token header.
    pub fn csrf_token(self, token: impl AsRef<str>) -> Self {
        self.header(CSRF_HEADER, token)
    }

    /// Sets `X-Forwarded-For`.
    pub fn forwarded_for(self, ip: impl AsRef<str>) -> Self {
        self.header("x-forwarded-for", ip)
    }

    /// Sets the inbound request ID.
    pub fn request_id(self, id: impl AsRef<str>) -> Self {
        self.header(REQUEST_ID_HEADER, id)
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Bytes::from(bytes),
            Err(e) => self.fail(TestError::Json(e)),
        }
        self.header(CONTENT_TYPE.as_str(), "application/json")
    }

    /// Builds the request.
    pub fn build(self) -> Result<Request, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("Invalid URI: {e}")))?;

        let mut request = http::Request::builder()
            .method(self.method)
            .uri(uri)
            .body(Full::new(self.body))
            .map_err(|e| TestError::RequestBuild(e.to_string()))?;

        *request.headers_mut() = self.headers;
        if !self.cookies.is_empty() {
            let cookie = HeaderValue::try_from(self.cookies.join("; "))
                .map_err(|e| TestError::InvalidHeader(e.to_string()))?;
            request.headers_mut().append(COOKIE, cookie);
        }
        Ok(request)
    }

    fn fail(&mut self, error: TestError) {
        self.error.get_or_insert(error);
    }
}
