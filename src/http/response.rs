//! Response envelope and API errors.
//!
//! Every body produced by the server uses the same wrapper:
//! `{"data": ..., "errors": [...], "meta": ...}`.
//!
//! Handlers return [`ApiError`] on failure. Its `IntoResponse` impl writes a
//! provisional envelope and stashes the error in the response extensions;
//! the request-ID stage then fills in the correlation identifier and logs
//! the failure (see [`finalize_error`]).

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::http::request::RequestId;

/// Standard response wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<ErrResponse>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
            meta: None,
        }
    }

    pub fn failure(errors: Vec<ErrResponse>) -> Self {
        Self {
            data: None,
            errors,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// One reported failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrResponse {
    pub id: String,
    pub status: u16,
    pub code: String,
    pub title: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Locates the part of the request that caused an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pointer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parameter: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub header: String,
}

impl ErrorSource {
    pub fn pointer(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            ..Self::default()
        }
    }

    pub fn parameter(parameter: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            ..Self::default()
        }
    }

    pub fn header(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }
}

/// 200 response carrying `data` in the envelope.
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(Envelope::success(data))).into_response()
}

/// Error returned by handlers and middleware.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub title: String,
    pub detail: String,
    pub source: Option<ErrorSource>,
    pub meta: Option<serde_json::Value>,
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: impl Into<String>,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            title: title.into(),
            detail: detail.into(),
            source: None,
            meta: None,
            cause: None,
        }
    }

    /// Error with the conventional `HTTP-<status>` code and the status reason as title.
    pub fn from_status(status: StatusCode, detail: impl Into<String>) -> Self {
        let title = status
            .canonical_reason()
            .unwrap_or("error")
            .to_ascii_lowercase();
        Self::new(status, format!("HTTP-{}", status.as_u16()), title, detail)
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::from_status(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::from_status(StatusCode::NOT_FOUND, detail)
    }

    pub fn too_many_requests(detail: impl Into<String>) -> Self {
        Self::from_status(StatusCode::TOO_MANY_REQUESTS, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::from_status(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    pub fn with_source(mut self, source: ErrorSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Attach the underlying error; it is logged but never sent to the client.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        self.cause.as_deref()
    }

    /// The wire representation for a given request.
    pub fn to_err_response(&self, request_id: &str) -> ErrResponse {
        ErrResponse {
            id: request_id.to_string(),
            status: self.status.as_u16(),
            code: self.code.clone(),
            title: self.title.clone(),
            detail: self.detail.clone(),
            source: self.source.clone(),
            meta: self.meta.clone(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.code, self.title, self.detail)?;
        if let Some(cause) = &self.cause {
            write!(f, " ({cause})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = Envelope::<()>::failure(vec![self.to_err_response("")]);
        let mut response = (self.status, Json(envelope)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Largest bare error body read back as the envelope detail.
const BARE_DETAIL_LIMIT: usize = 1024;

/// Render a pending [`ApiError`] with the request's correlation identifier.
///
/// Error statuses produced without an [`ApiError`] (framework rejections,
/// handlers returning a bare status) are wrapped into the envelope too,
/// using their text body as the detail. JSON error bodies and successful
/// responses pass through unchanged. Errors below 500 are logged at warn
/// level, the rest at error level.
pub async fn finalize_error(request_id: &RequestId, response: Response) -> Response {
    let (mut parts, body) = response.into_parts();
    let error = match parts.extensions.remove::<ApiError>() {
        Some(error) => error,
        None if is_bare_error(&parts) => {
            let detail = match axum::body::to_bytes(body, BARE_DETAIL_LIMIT).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
                Err(_) => String::new(),
            };
            ApiError::from_status(parts.status, detail)
        }
        None => return Response::from_parts(parts, body),
    };

    if error.status.is_server_error() {
        tracing::error!(
            request_id = %request_id,
            status = error.status.as_u16(),
            code = %error.code,
            cause = ?error.cause(),
            "{}", error.detail
        );
    } else {
        tracing::warn!(
            request_id = %request_id,
            status = error.status.as_u16(),
            code = %error.code,
            cause = ?error.cause(),
            "{}", error.detail
        );
    }

    parts.headers.remove(header::CONTENT_LENGTH);
    let envelope = Envelope::<()>::failure(vec![error.to_err_response(request_id.as_str())]);
    match serde_json::to_vec(&envelope) {
        Ok(bytes) => {
            parts.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to encode error envelope");
            parts.headers.remove(header::CONTENT_TYPE);
            Response::from_parts(parts, Body::empty())
        }
    }
}

fn is_bare_error(parts: &axum::http::response::Parts) -> bool {
    let status = parts.status;
    if !(status.is_client_error() || status.is_server_error()) {
        return false;
    }
    !parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_envelope_shape() {
        let err = ApiError::not_found("no such page")
            .with_source(ErrorSource::parameter("id"))
            .to_err_response("abc");
        let value = serde_json::to_value(Envelope::<()>::failure(vec![err])).unwrap();

        assert_eq!(
            value,
            json!({
                "data": null,
                "errors": [{
                    "id": "abc",
                    "status": 404,
                    "code": "HTTP-404",
                    "title": "not found",
                    "detail": "no such page",
                    "source": { "parameter": "id" }
                }],
                "meta": null
            })
        );
    }

    #[test]
    fn success_envelope_has_empty_error_list() {
        let value = serde_json::to_value(Envelope::success(json!({ "n": 1 }))).unwrap();
        assert_eq!(value, json!({ "data": { "n": 1 }, "errors": [], "meta": null }));
    }

    #[test]
    fn optional_fields_are_omitted() {
        let value = serde_json::to_value(ApiError::internal("boom").to_err_response("id-1")).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("source"));
        assert!(!object.contains_key("meta"));
        assert_eq!(object["title"], "internal server error");
    }

    #[test]
    fn cause_is_logged_not_serialized() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = ApiError::internal("storage failed").with_cause(io);
        assert!(err.to_string().contains("disk on fire"));

        let value = serde_json::to_value(err.to_err_response("x")).unwrap();
        assert!(!value.to_string().contains("disk on fire"));
    }

    #[tokio::test]
    async fn finalize_fills_request_id() {
        let id = RequestId::new("req-42");
        let response =
            finalize_error(&id, ApiError::too_many_requests("slow down").into_response()).await;

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.extensions().get::<ApiError>().is_none());

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.errors[0].id, "req-42");
        assert_eq!(envelope.errors[0].code, "HTTP-429");
    }

    #[tokio::test]
    async fn finalize_leaves_plain_responses_alone() {
        let id = RequestId::new("req-1");
        let response = finalize_error(&id, success_response(json!("ok"))).await;
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.data, Some(json!("ok")));
    }

    #[tokio::test]
    async fn bare_error_status_is_wrapped() {
        let id = RequestId::new("req-7");
        let bare = (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded").into_response();
        let response = finalize_error(&id, bare).await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.errors[0].id, "req-7");
        assert_eq!(envelope.errors[0].code, "HTTP-413");
        assert_eq!(envelope.errors[0].detail, "length limit exceeded");
    }

    #[tokio::test]
    async fn empty_bare_error_keeps_headers() {
        let id = RequestId::new("req-8");
        let bare = (StatusCode::UNAUTHORIZED, [(header::WWW_AUTHENTICATE, "Bearer")]).into_response();
        let response = finalize_error(&id, bare).await;

        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.errors[0].code, "HTTP-401");
        assert_eq!(envelope.errors[0].title, "unauthorized");
    }

    #[tokio::test]
    async fn json_error_bodies_are_left_alone() {
        let id = RequestId::new("req-9");
        let custom = (StatusCode::CONFLICT, Json(json!({ "reason": "taken" }))).into_response();
        let response = finalize_error(&id, custom).await;

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({ "reason": "taken" }));
    }
}
