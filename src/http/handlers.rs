//! HTTP handlers for the Turnstile service.

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::ratelimit::{Decision, RateLimiter, UNKNOWN_CLIENT};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the service answers
    pub status: &'static str,
    /// Service name
    pub service: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Number of rate limit records currently held
    pub tracked_records: usize,
}

/// Rate limit check request, for proxies that consult the service.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// Client identifier; missing or blank means `"unknown"`
    #[serde(default)]
    pub client: Option<String>,
    /// Request path to check
    pub path: String,
}

/// Rate limit check response.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    /// Whether the path falls under a rate limit rule
    pub protected: bool,
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests allowed per window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Requests left in the current window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    /// Window end, epoch milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<u64>,
    /// Seconds to wait before retrying, on rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<Option<Decision>> for CheckResponse {
    fn from(decision: Option<Decision>) -> Self {
        match decision {
            None => CheckResponse {
                protected: false,
                allowed: true,
                limit: None,
                remaining: None,
                reset: None,
                retry_after: None,
            },
            Some(decision) => CheckResponse {
                protected: true,
                allowed: decision.is_admitted(),
                limit: Some(decision.limit()),
                remaining: Some(decision.remaining()),
                reset: Some(decision.reset_at_ms()),
                retry_after: match decision {
                    Decision::Reject { retry_after_secs, .. } => Some(retry_after_secs),
                    Decision::Admit { .. } => None,
                },
            },
        }
    }
}

/// Not-found response body.
#[derive(Debug, Serialize)]
pub struct NotFoundResponse {
    /// Error message
    pub error: &'static str,
    /// Path that was requested
    pub path: String,
}

/// Health check endpoint.
pub async fn health(State(limiter): State<Arc<RateLimiter>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "turnstile",
        version: env!("CARGO_PKG_VERSION"),
        tracked_records: limiter.record_count(),
    })
}

/// Check and record a request on behalf of a reverse proxy.
///
/// Always answers 200 so the caller can read the decision from the body.
pub async fn check(
    State(limiter): State<Arc<RateLimiter>>,
    Json(req): Json<CheckRequest>,
) -> Json<CheckResponse> {
    let client = req
        .client
        .as_deref()
        .map(str::trim)
        .filter(|client| !client.is_empty())
        .unwrap_or(UNKNOWN_CLIENT);

    let decision = limiter.check(client, &req.path);
    let response = CheckResponse::from(decision);

    if response.allowed {
        debug!(client = %client, path = %req.path, protected = response.protected, "Check allowed");
    } else {
        info!(
            client = %client,
            path = %req.path,
            retry_after_secs = response.retry_after,
            "Check rate limited"
        );
    }

    Json(response)
}

/// Fallback for paths the service does not serve.
pub async fn not_found(uri: Uri) -> (StatusCode, Json<NotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "Not found",
            path: uri.path().to_string(),
        }),
    )
}
