//! CORS stage built from comma-separated configuration lists.

use axum::http::{HeaderName, HeaderValue, Method};
use std::str::FromStr;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

fn split(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Build the CORS layer. Credentials are allowed unless every origin is.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins_raw = config.effective_origins();
    let any_origin = split(origins_raw).any(|origin| origin == "*");

    let origin = if any_origin {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = split(origins_raw)
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    let methods: Vec<Method> = split(config.effective_methods())
        .filter_map(|method| Method::from_str(&method.to_ascii_uppercase()).ok())
        .collect();

    let headers: Vec<HeaderName> = split(config.effective_headers())
        .filter_map(|name| match HeaderName::from_str(name) {
            Ok(name) => Some(name),
            Err(_) => {
                tracing::warn!(header = %name, "Ignoring invalid CORS header");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::list(methods))
        .allow_headers(AllowHeaders::list(headers))
        .allow_credentials(!any_origin)
}
