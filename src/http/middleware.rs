//! Rate limiting middleware.

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::response::{insert_rate_limit_headers, TooManyRequests};
use crate::ratelimit::{client_id, RateLimiter};

/// Apply the limiter to every request `router` serves.
///
/// ```rust,ignore
/// let app = turnstile::http::protect(Router::new().route("/api/artigos", get(list)), limiter);
/// ```
pub fn protect<S>(router: Router<S>, limiter: Arc<RateLimiter>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
}

/// Middleware function for per-client, per-endpoint rate limiting.
///
/// Requests outside the protected namespace pass through untouched. Admitted
/// requests get `X-RateLimit-*` headers on their response; rejected ones get
/// a 429 without reaching the inner service.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_id(request.headers());
    let path = request.uri().path();

    // The check is synchronous; nothing is awaited between read and write.
    let Some(decision) = limiter.check(&client, path) else {
        return next.run(request).await;
    };

    if let Some(rejection) = TooManyRequests::from_decision(&decision) {
        warn!(
            client = %client,
            path = %path,
            limit = rejection.limit,
            retry_after_secs = rejection.retry_after_secs,
            "Rate limit exceeded"
        );
        return rejection.into_response();
    }

    debug!(
        client = %client,
        path = %path,
        remaining = decision.remaining(),
        "Request admitted"
    );

    let mut response = next.run(request).await;
    insert_rate_limit_headers(response.headers_mut(), &decision);
    response
}
