//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Middleware chain and lifecycle produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracing.rs (one span per request, tagged with the request ID)
//!
//! Consumers:
//!     → stdout (JSON or pretty)
//!     → /debug/pprof/metrics (Prometheus text, when profiling is enabled)
//! ```

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use logging::{try_init_logging, LoggingError};
