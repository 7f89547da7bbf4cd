//! Security stages of the middleware chain.
//!
//! - headers.rs: protective response headers and `Server`
//! - cors.rs: cross-origin resource sharing
//! - rate_limit.rs: sliding-window limiter per client IP

pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use cors::cors_layer;
pub use headers::{apply_security_headers, SECURITY_HEADERS};
pub use rate_limit::{rate_limit_middleware, RateDecision, SlidingWindowLimiter};
