//! Operational endpoints.
//!
//! # Data Flow
//! ```text
//! GET <status>  → {"AppVersion": ...}
//! GET <health>  → 200 (liveness)
//! GET <ready>   → 200 (readiness)
//! GET <upstart> → 200 (startup)
//! GET <oas>     → registered OpenAPI document
//! anything else → 404 envelope (HTTP-404)
//! ```
//!
//! Each path defaults independently when its override is empty.

pub mod probes;

pub use probes::{not_found, oas_route, probe_routes, StatusBody, NOT_FOUND_DETAIL};
