//! Outbound HTTP client subsystem.
//!
//! # Data Flow
//! ```text
//! RequestOptions / MultipartRequestOptions
//!     → executor.rs (build request, apply headers, bind timeout)
//!     → reqwest connection pool
//!     → status check against expect_code
//!     → optional JSON decode into the caller's type
//! ```
//!
//! # Design Decisions
//! - One network round trip per call: no retries, no caching
//! - Timeout zero is normalized to 10 seconds
//! - Construction, transport, timeout, status and decode failures are distinct errors

pub mod error;
pub mod executor;
pub mod options;

pub use error::ClientError;
pub use executor::{HttpClient, ERROR_BODY_LIMIT};
pub use options::{MultipartRequestOptions, RequestOptions, DEFAULT_TIMEOUT};
