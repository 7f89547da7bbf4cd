//! Network layer.
//!
//! # Data Flow
//! ```text
//! bind (listener.rs, optional SO_REUSEPORT)
//!     → accept_loop: one task per connection, hyper auto (HTTP/1.1 + HTTP/2)
//!     → connection.rs: ID + open connection count
//!     → axum Router (middleware chain + handlers)
//! ```

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{accept_loop, bind, ConnectionSettings, ListenerError};
