//! Operational endpoints: status, liveness, readiness, startup, OpenAPI
//! document and the catch-all 404.

use axum::{
    body::Bytes,
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::DefaultPaths;
use crate::http::response::ApiError;

/// Body of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    #[serde(rename = "AppVersion")]
    pub app_version: String,
}

async fn ok() -> StatusCode {
    StatusCode::OK
}

/// Routes for the four probes at their configured paths.
pub fn probe_routes(paths: &DefaultPaths, app_version: &str) -> Router {
    let status = StatusBody {
        app_version: app_version.to_string(),
    };

    Router::new()
        .route(
            paths.status_path(),
            get(move || {
                let status = status.clone();
                async move { Json(status) }
            }),
        )
        .route(paths.health_path(), get(ok))
        .route(paths.ready_path(), get(ok))
        .route(paths.upstart_path(), get(ok))
}

/// Route serving a pre-rendered OpenAPI document verbatim as JSON.
pub fn oas_route(path: &str, document: Bytes) -> Router {
    Router::new().route(
        path,
        get(move || {
            let document = document.clone();
            async move { ([(header::CONTENT_TYPE, "application/json")], document) }
        }),
    )
}

/// Detail of the catch-all 404; fixed so request paths are never echoed back.
pub const NOT_FOUND_DETAIL: &str = "the page you are looking for does not exist";

/// Fallback for unmatched routes and unmatched methods on known routes.
pub async fn not_found() -> ApiError {
    ApiError::not_found(NOT_FOUND_DETAIL)
}
