//! Request correlation identifiers.
//!
//! # Responsibilities
//! - Generate a unique request ID before any other stage runs
//! - Make it available to later stages and handlers (extensions / extractor)
//! - Echo it in the `X-Request-ID` response header
//! - Render pending error envelopes with the same identifier
//!
//! # Design Decisions
//! - A client-supplied `X-Request-ID` is never trusted; one is always generated
//! - Generation failure aborts the request with a bare 500

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::http::response::{finalize_error, ApiError};

/// Response header carrying the correlation identifier.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation identifier of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .ok_or_else(|| ApiError::internal("request id unavailable"))
    }
}

/// Access to the request ID attached by the chain.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for axum::http::Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

impl RequestIdExt for Parts {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions.get::<RequestId>()
    }
}

#[derive(Debug, Error)]
#[error("request id generation failed: {0}")]
pub struct IdError(pub String);

/// Source of request identifiers.
pub trait IdGenerator: Send + Sync + 'static {
    fn generate(&self) -> Result<RequestId, IdError>;
}

/// Random UUID v4 rendered without hyphens.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> Result<RequestId, IdError> {
        Ok(RequestId::new(Uuid::new_v4().simple().to_string()))
    }
}

/// First stage of the chain: attach an ID, run the rest, stamp the response.
pub async fn request_id_middleware(
    State(ids): State<Arc<dyn IdGenerator>>,
    mut request: Request,
    next: Next,
) -> Response {
    let id = match ids.generate() {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, path = %request.uri().path(), "Failed to generate request id");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let header_value = match HeaderValue::from_str(id.as_str()) {
        Ok(value) => value,
        Err(_) => {
            tracing::error!(request_id = %id, "Generated request id is not a valid header value");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    request.extensions_mut().insert(id.clone());
    let response = next.run(request).await;

    let mut response = finalize_error(&id, response).await;
    response.headers_mut().insert(X_REQUEST_ID, header_value);
    response
}

/// Best-effort client address: the peer address recorded by the listener.
pub fn client_ip<B>(request: &axum::http::Request<B>) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
