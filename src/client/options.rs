//! Per-call request options.

use reqwest::multipart::Form;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::client::error::ClientError;

/// Timeout applied when a call leaves `timeout` at zero.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for a single JSON request.
///
/// Built by the caller and consumed once by
/// [`HttpClient::execute`](crate::client::HttpClient::execute) or one of its
/// siblings.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Serialized as the JSON request body when present.
    pub body: Option<serde_json::Value>,
    /// Applied last; replaces any default header of the same name.
    pub headers: HashMap<String, String>,
    /// The response status must equal this exactly.
    pub expect_code: StatusCode,
    /// Zero means [`DEFAULT_TIMEOUT`].
    pub timeout: Duration,
}

impl RequestOptions {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            headers: HashMap::new(),
            expect_code: StatusCode::OK,
            timeout: Duration::ZERO,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize any value as the request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body).map_err(ClientError::Encode)?);
        Ok(self)
    }

    pub fn expect(mut self, code: StatusCode) -> Self {
        self.expect_code = code;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The deadline actually applied to the call.
    pub fn effective_timeout(&self) -> Duration {
        effective_timeout(self.timeout)
    }
}

/// Options for a single multipart request.
#[derive(Debug)]
pub struct MultipartRequestOptions {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Pre-built multipart payload; its boundary determines `Content-Type`.
    pub form: Option<Form>,
    pub headers: HashMap<String, String>,
    pub expect_code: StatusCode,
    pub timeout: Duration,
}

impl MultipartRequestOptions {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            form: None,
            headers: HashMap::new(),
            expect_code: StatusCode::OK,
            timeout: Duration::ZERO,
        }
    }

    pub fn form(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn expect(mut self, code: StatusCode) -> Self {
        self.expect_code = code;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn effective_timeout(&self) -> Duration {
        effective_timeout(self.timeout)
    }

    /// `Content-Type` the form will be sent with, if a form is set.
    pub fn content_type(&self) -> Option<String> {
        self.form
            .as_ref()
            .map(|form| format!("multipart/form-data; boundary={}", form.boundary()))
    }
}

fn effective_timeout(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        DEFAULT_TIMEOUT
    } else {
        timeout
    }
}
