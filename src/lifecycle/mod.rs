//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → HttpServer::serve → cleanup callback → stop accept → drain
//!
//! State (state.rs):
//!     Created → Listening → ShuttingDown → Stopped | Fatal
//! ```
//!
//! # Design Decisions
//! - The shutdown signal is an explicit receiver handed to the server
//! - Shutdown has a deadline: exceeding it is a fatal error

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_listener, wait_for_signal};
pub use state::{ServerState, StateCell};
