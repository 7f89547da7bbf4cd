//! Per-request spans.
//!
//! One span per inbound request, tagged with the correlation identifier
//! attached by the request-ID stage so every event logged while handling the
//! request can be tied back to it.

use axum::{body::Body, http::Request};
use tower_http::trace::{HttpMakeClassifier, TraceLayer};
use tracing::Span;

use crate::http::request::RequestIdExt;

pub type RequestTraceLayer = TraceLayer<HttpMakeClassifier, fn(&Request<Body>) -> Span>;

pub fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .request_id()
        .map(|id| id.as_str())
        .unwrap_or("-");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}

pub fn trace_layer() -> RequestTraceLayer {
    TraceLayer::new_for_http().make_span_with(make_span as fn(&Request<Body>) -> Span)
}
