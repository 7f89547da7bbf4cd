//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net)
//!     → server.rs (router assembly, serve loop, shutdown)
//!     → middleware/ (ordered stage chain)
//!     → request.rs (request ID, client address)
//!     → handler
//!     → response.rs (envelope, ApiError rendering)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::{MiddlewareChain, Stage};
pub use request::{IdGenerator, RequestId, RequestIdExt, UuidGenerator, X_REQUEST_ID};
pub use response::{success_response, ApiError, Envelope, ErrResponse, ErrorSource};
pub use server::{HttpServer, ServerError};
