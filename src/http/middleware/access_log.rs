//! Access log stage: one structured line per completed request.

use axum::{extract::Request, http::header, middleware::Next, response::Response};
use std::time::Instant;

use crate::http::request::{client_ip, RequestIdExt};
use crate::net::ConnectionId;
use crate::observability::metrics;

pub async fn access_log_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let client = client_ip(&request)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "-".to_string());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_owned();
    let request_id = request
        .request_id()
        .map(|id| id.to_string())
        .unwrap_or_default();
    let connection = request
        .extensions()
        .get::<ConnectionId>()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(request).await;
    let status = response.status().as_u16();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status,
        latency_ms = start.elapsed().as_secs_f64() * 1000.0,
        client_ip = %client,
        user_agent = %user_agent,
        connection_id = %connection,
        "Request completed"
    );
    metrics::record_request(method.as_str(), status, start);

    response
}
