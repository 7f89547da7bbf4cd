//! Runtime diagnostics under `/debug/pprof`.
//!
//! Endpoints (GET only):
//! - `/debug/pprof/`: index of the endpoints below
//! - `/debug/pprof/runtime`: tokio runtime and connection statistics
//! - `/debug/pprof/metrics`: Prometheus text exposition
//!
//! Any other request passes through untouched.

use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::time::Instant;

use crate::http::response::{success_response, ApiError};
use crate::net::ConnectionTracker;
use crate::observability::metrics;

pub const PROFILING_PREFIX: &str = "/debug/pprof";

#[derive(Clone)]
pub struct ProfilingState {
    started: Instant,
    connections: ConnectionTracker,
    metrics: Option<PrometheusHandle>,
}

impl ProfilingState {
    pub fn new(connections: ConnectionTracker, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            started: Instant::now(),
            connections,
            metrics,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Index,
    Runtime,
    Metrics,
}

fn endpoint(method: &Method, path: &str) -> Option<Endpoint> {
    if method != Method::GET {
        return None;
    }
    let rest = path.strip_prefix(PROFILING_PREFIX)?;
    match rest.trim_end_matches('/') {
        "" => Some(Endpoint::Index),
        "/runtime" => Some(Endpoint::Runtime),
        "/metrics" => Some(Endpoint::Metrics),
        _ => None,
    }
}

pub async fn profiling_middleware(
    State(state): State<ProfilingState>,
    request: Request,
    next: Next,
) -> Response {
    match endpoint(request.method(), request.uri().path()) {
        None => next.run(request).await,
        Some(Endpoint::Index) => success_response(json!({
            "endpoints": [
                format!("{PROFILING_PREFIX}/runtime"),
                format!("{PROFILING_PREFIX}/metrics"),
            ]
        })),
        Some(Endpoint::Runtime) => runtime_stats(&state),
        Some(Endpoint::Metrics) => match &state.metrics {
            Some(handle) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                metrics::render(handle),
            )
                .into_response(),
            None => ApiError::from_status(
                StatusCode::SERVICE_UNAVAILABLE,
                "metrics recorder not installed",
            )
            .into_response(),
        },
    }
}

fn runtime_stats(state: &ProfilingState) -> Response {
    let mut stats = json!({
        "pid": std::process::id(),
        "uptime_secs": state.started.elapsed().as_secs(),
        "active_connections": state.connections.active_count(),
        "accepted_connections": state.connections.accepted_count(),
    });

    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        let runtime = handle.metrics();
        stats["workers"] = json!(runtime.num_workers());
        stats["alive_tasks"] = json!(runtime.num_alive_tasks());
        stats["global_queue_depth"] = json!(runtime.global_queue_depth());
    }

    success_response(stats)
}
