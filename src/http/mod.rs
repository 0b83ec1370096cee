//! HTTP surface: the rate limit middleware and the standalone service.

mod handlers;
mod middleware;
mod response;
mod server;

pub use handlers::{CheckRequest, CheckResponse, HealthResponse};
pub use middleware::{protect, rate_limit_middleware};
pub use response::{insert_rate_limit_headers, TooManyRequests, TooManyRequestsBody};
pub use server::{router, HttpServer};
