//! Responses for rejected requests.

use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use super::headers::RateLimitInfo;
use super::options::RateLimitOptions;

/// Builds the response for a request that is over its limit.
///
/// Rate limit headers are added to whatever this returns.
pub trait RejectionHandler: Send + Sync {
    fn reject(&self, parts: &Parts, info: &RateLimitInfo, options: &RateLimitOptions) -> Response;
}

impl<F> RejectionHandler for F
where
    F: Fn(&Parts, &RateLimitInfo, &RateLimitOptions) -> Response + Send + Sync,
{
    fn reject(&self, parts: &Parts, info: &RateLimitInfo, options: &RateLimitOptions) -> Response {
        self(parts, info, options)
    }
}

/// Responds with the configured status code and message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRejection;

impl RejectionHandler for DefaultRejection {
    fn reject(&self, _parts: &Parts, _info: &RateLimitInfo, options: &RateLimitOptions) -> Response {
        (options.status_code, options.message.clone()).into_response()
    }
}
