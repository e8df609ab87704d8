//! Response options for the rate limit layer.

use axum::http::StatusCode;

/// Default body sent to rejected clients.
pub const DEFAULT_MESSAGE: &str = "Too many requests, please try again later.";

/// How the layer shapes its responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitOptions {
    /// Status used by the default rejection handler
    pub status_code: StatusCode,
    /// Body used by the default rejection handler
    pub message: String,
    /// Emit the `X-RateLimit-*` and `X-Retry-After` headers
    pub legacy_headers: bool,
    /// Emit the `RateLimit-*` and `Retry-After` headers
    pub standard_headers: bool,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            status_code: StatusCode::TOO_MANY_REQUESTS,
            message: DEFAULT_MESSAGE.to_string(),
            legacy_headers: true,
            standard_headers: false,
        }
    }
}
