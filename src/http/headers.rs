//! Rate limit response headers.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use chrono::{DateTime, SecondsFormat, Utc};

use super::options::RateLimitOptions;
use crate::ratelimit::IncrementResult;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_USED: HeaderName = HeaderName::from_static("x-ratelimit-used");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RETRY_AFTER: HeaderName = HeaderName::from_static("x-retry-after");
pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_USED: HeaderName = HeaderName::from_static("ratelimit-used");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");

/// Rate limit state for one request.
///
/// Admitted requests carry this in their extensions, so handlers can read it
/// with `Extension<RateLimitInfo>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Hit ceiling per window
    pub limit: u64,
    /// Hits reported for this request
    pub current: u64,
    /// Hits left in the window, floored at zero
    pub remaining: u64,
    /// When the window ends
    pub reset_time: DateTime<Utc>,
}

impl RateLimitInfo {
    pub fn new(limit: u64, result: &IncrementResult) -> Self {
        Self {
            limit,
            current: result.total_hits,
            remaining: limit.saturating_sub(result.total_hits),
            reset_time: result.reset_time,
        }
    }

    /// `reset_time` as an ISO-8601 timestamp, e.g. `2024-01-01T00:01:00.000Z`.
    pub fn reset_time_iso(&self) -> String {
        self.reset_time.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Write limit, used and remaining counts in the enabled conventions.
pub fn apply_usage(headers: &mut HeaderMap, info: &RateLimitInfo, options: &RateLimitOptions) {
    if options.legacy_headers {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(info.limit));
        headers.insert(X_RATELIMIT_USED, HeaderValue::from(info.current));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(info.remaining));
    }

    if options.standard_headers {
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(info.limit));
        headers.insert(RATELIMIT_USED, HeaderValue::from(info.current));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(info.remaining));
    }
}

/// Write the window end as a retry indicator in the enabled conventions.
pub fn apply_retry_after(headers: &mut HeaderMap, info: &RateLimitInfo, options: &RateLimitOptions) {
    if !options.legacy_headers && !options.standard_headers {
        return;
    }

    // RFC 3339 output is always a valid header value.
    let Ok(value) = HeaderValue::from_str(&info.reset_time_iso()) else {
        return;
    };

    if options.legacy_headers {
        headers.insert(X_RETRY_AFTER, value.clone());
    }
    if options.standard_headers {
        headers.insert(RETRY_AFTER, value);
    }
}
