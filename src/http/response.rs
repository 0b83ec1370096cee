//! HTTP responses produced by the rate limiter.

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::ratelimit::Decision;

/// Requests allowed per window.
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Requests left in the current window.
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Window end in epoch milliseconds.
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Body of a 429 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TooManyRequestsBody {
    /// Fixed error label
    pub error: &'static str,
    /// Human-readable message naming the wait
    pub message: String,
    /// Seconds until the window resets
    pub retry_after: u64,
}

/// Terminal response for a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooManyRequests {
    /// Requests allowed per window
    pub limit: u64,
    /// Window end, epoch milliseconds
    pub reset_at_ms: u64,
    /// Value of the `Retry-After` header
    pub retry_after_secs: u64,
}

impl TooManyRequests {
    /// Build from a decision, if it is a rejection.
    pub fn from_decision(decision: &Decision) -> Option<Self> {
        match *decision {
            Decision::Reject {
                limit,
                reset_at_ms,
                retry_after_secs,
            } => Some(Self {
                limit,
                reset_at_ms,
                retry_after_secs,
            }),
            Decision::Admit { .. } => None,
        }
    }
}

impl IntoResponse for TooManyRequests {
    fn into_response(self) -> Response {
        let body = TooManyRequestsBody {
            error: "Too many requests",
            message: format!(
                "Rate limit exceeded. Try again in {} seconds.",
                self.retry_after_secs
            ),
            retry_after: self.retry_after_secs,
        };

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u64));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_at_ms));
        response
    }
}

/// Attach the advisory `X-RateLimit-*` headers for a decision.
pub fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit()));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining()));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at_ms()));
}
