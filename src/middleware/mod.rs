//! Middleware for observability and rate limiting.
//!
//! This module provides:
//! - Request logging with latency tracking
//! - Sliding-window rate limiting per authenticated user

pub mod logging;
pub mod rate_limit;

pub use logging::request_logging;
pub use rate_limit::{rate_limit_middleware, RateLimitConfig, UserRateLimiter};
