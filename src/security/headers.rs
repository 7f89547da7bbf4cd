//! Protective response headers.
//!
//! Applied to every response, including errors and probe endpoints. The
//! set mirrors the usual helmet defaults.

use axum::{
    http::{header, HeaderName, HeaderValue},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

/// Header name / value pairs set on every response.
pub const SECURITY_HEADERS: [(&str, &str); 11] = [
    ("x-xss-protection", "0"),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    ("cross-origin-embedder-policy", "require-corp"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-permitted-cross-domain-policies", "none"),
];

/// Wrap `router` so every response carries the security headers and `Server`.
pub fn apply_security_headers(router: Router, server_header: &str) -> Router {
    let mut router = SECURITY_HEADERS.iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ))
    });

    if !server_header.is_empty() {
        match HeaderValue::from_str(server_header) {
            Ok(value) => {
                router = router.layer(SetResponseHeaderLayer::overriding(header::SERVER, value));
            }
            Err(_) => {
                tracing::warn!(server_header = %server_header, "Invalid Server header value, not set");
            }
        }
    }

    router
}
