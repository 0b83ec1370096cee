//! Turnstile - Per-endpoint HTTP Rate Limiting
//!
//! This crate implements fixed-window rate limiting for HTTP APIs. Each
//! client (identified by its first forwarded address) gets an independent
//! request budget per endpoint prefix, and requests over budget are answered
//! with `429 Too Many Requests` before they reach the application.
//!
//! The limiter can be embedded as axum middleware via [`http::protect`] or
//! run as a standalone service exposing a check endpoint for reverse proxies.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
