//! HTTP server implementation.

use axum::{
    routing::{any, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::handlers::{check, health, not_found};
use super::middleware::protect;
use crate::error::{Result, TurnstileError};
use crate::ratelimit::RateLimiter;

/// HTTP server for the rate limit service.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    rate_limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<RateLimiter>) -> Self {
        Self { addr, rate_limiter }
    }

    /// Build the service router.
    ///
    /// The `/api/` namespace is guarded by the rate limit middleware; the
    /// service has no content of its own there and answers 404 once a
    /// request is admitted.
    pub fn router(&self) -> Router {
        router(self.rate_limiter.clone())
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "Starting HTTP server with graceful shutdown");

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                TurnstileError::Server(e.to_string())
            })
    }
}

/// Build the service router around `limiter`.
pub fn router(limiter: Arc<RateLimiter>) -> Router {
    let routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ratelimit/check", post(check))
        .route("/api/*path", any(not_found))
        .fallback(not_found)
        .with_state(limiter.clone());

    protect(routes, limiter).layer(TraceLayer::new_for_http())
}
