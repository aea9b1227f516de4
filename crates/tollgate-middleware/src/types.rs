//! Common types used throughout the gateway pipeline.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderValue, StatusCode};
use http_body_util::Full;

/// The HTTP request type seen by the gateway.
///
/// This is a standard `http::Request` with a `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type produced by the gateway.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building gateway responses.
pub trait ResponseExt {
    /// Creates a JSON response with the given status code.
    fn json(status: StatusCode, body: &serde_json::Value) -> Response;

    /// Creates a `307 Temporary Redirect` to `location`.
    ///
    /// An unrepresentable location degrades to `/`.
    fn redirect(location: &str) -> Response;
}

impl ResponseExt for Response {
    fn json(status: StatusCode, body: &serde_json::Value) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::from(body.to_string())));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    fn redirect(location: &str) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::TEMPORARY_REDIRECT;
        let location =
            HeaderValue::from_str(location).unwrap_or_else(|_| HeaderValue::from_static("/"));
        response.headers_mut().insert(LOCATION, location);
        response
    }
}
