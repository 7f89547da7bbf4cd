//! Secure HTTP service toolkit.
//!
//! - [`client`]: outbound requests with standard timeouts, headers and
//!   expected-status checking
//! - [`http`]: inbound server bootstrap with an ordered middleware chain,
//!   operational probes and graceful shutdown

pub mod client;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use client::{ClientError, HttpClient, MultipartRequestOptions, RequestOptions};
pub use config::ServerConfig;
pub use http::{ApiError, HttpServer, ServerError};
pub use lifecycle::Shutdown;
