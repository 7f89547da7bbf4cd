//! Outbound request execution.
//!
//! Every call is exactly one network round trip bounded by the call's
//! timeout. The response status must match the expected code; mismatches
//! report up to [`ERROR_BODY_LIMIT`] bytes of the body. The response is
//! dropped (and its connection released) on every exit path.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::client::error::ClientError;
use crate::client::options::{MultipartRequestOptions, RequestOptions};
use crate::config::ClientConfig;

/// Maximum number of body bytes quoted in a status mismatch error.
pub const ERROR_BODY_LIMIT: usize = 1024;

/// Pooled outbound HTTP client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    /// Build a client with pooling and timeouts from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(ClientError::Client)?;

        Ok(Self { inner })
    }

    /// Wrap an already configured `reqwest` client.
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    /// The underlying `reqwest` client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Send a JSON request and check its status; the body is not decoded.
    pub async fn execute(&self, options: RequestOptions) -> Result<(), ClientError> {
        let timeout = options.effective_timeout();
        let expect = options.expect_code;
        let builder = self.prepare(&options)?;
        send_checked(builder, expect, timeout).await?;
        Ok(())
    }

    /// Send a JSON request, check its status and decode the body into `T`.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let timeout = options.effective_timeout();
        let expect = options.expect_code;
        let builder = self.prepare(&options)?;
        let response = send_checked(builder, expect, timeout).await?;
        decode(response, timeout).await
    }

    /// Send a multipart request and check its status; the body is not decoded.
    pub async fn execute_multipart(&self, options: MultipartRequestOptions) -> Result<(), ClientError> {
        let timeout = options.effective_timeout();
        let expect = options.expect_code;
        let builder = self.prepare_multipart(options)?;
        send_checked(builder, expect, timeout).await?;
        Ok(())
    }

    /// Send a multipart request, check its status and decode the body into `T`.
    pub async fn execute_multipart_json<T: DeserializeOwned>(
        &self,
        options: MultipartRequestOptions,
    ) -> Result<T, ClientError> {
        let timeout = options.effective_timeout();
        let expect = options.expect_code;
        let builder = self.prepare_multipart(options)?;
        let response = send_checked(builder, expect, timeout).await?;
        decode(response, timeout).await
    }

    /// Fire-and-forget.
    ///
    /// Spawns a task that sends the request and drains the whole body so the
    /// connection can go back to the pool, then returns immediately. There is
    /// no result channel: failures are logged at debug level and dropped, and
    /// the expected status is not checked. Must be called inside a Tokio
    /// runtime.
    pub fn dispatch(&self, options: RequestOptions) {
        let client = self.clone();
        tokio::spawn(async move {
            let timeout = options.effective_timeout();
            let builder = match client.prepare(&options) {
                Ok(builder) => builder,
                Err(e) => {
                    tracing::debug!(url = %options.url, error = %e, "Dispatch dropped: invalid request");
                    return;
                }
            };

            match builder.send().await {
                Ok(mut response) => {
                    let status = response.status();
                    loop {
                        match response.chunk().await {
                            Ok(Some(_)) => continue,
                            Ok(None) => break,
                            Err(e) => {
                                tracing::debug!(url = %options.url, error = %e, "Dispatch body drain failed");
                                break;
                            }
                        }
                    }
                    tracing::debug!(url = %options.url, status = %status, "Dispatch completed");
                }
                Err(e) => {
                    let e = ClientError::from_send(e, timeout);
                    tracing::debug!(url = %options.url, error = %e, "Dispatch failed");
                }
            }
        });
    }

    fn prepare(&self, options: &RequestOptions) -> Result<RequestBuilder, ClientError> {
        let url = parse_url(&options.url)?;
        let headers = header_map(&options.headers)?;

        let mut builder = self
            .inner
            .request(options.method.clone(), url)
            .timeout(options.effective_timeout());

        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }

        if let Some(body) = &options.body {
            let bytes = serde_json::to_vec(body).map_err(ClientError::Encode)?;
            builder = builder
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(bytes);
        }

        Ok(builder.headers(headers))
    }

    fn prepare_multipart(&self, options: MultipartRequestOptions) -> Result<RequestBuilder, ClientError> {
        let url = parse_url(&options.url)?;
        let headers = header_map(&options.headers)?;
        let timeout = options.effective_timeout();

        let mut builder = self.inner.request(options.method, url).timeout(timeout);

        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }

        if let Some(form) = options.form {
            builder = builder.multipart(form);
        }

        Ok(builder.headers(headers))
    }
}

fn parse_url(raw: &str) -> Result<Url, ClientError> {
    Url::parse(raw).map_err(|source| ClientError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, ClientError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ClientError::InvalidHeader {
                name: name.clone(),
                source: Box::new(e),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| ClientError::InvalidHeader {
            name: name.clone(),
            source: Box::new(e),
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

async fn send_checked(
    builder: RequestBuilder,
    expect: StatusCode,
    timeout: Duration,
) -> Result<Response, ClientError> {
    let start = Instant::now();
    let response = builder
        .send()
        .await
        .map_err(|e| ClientError::from_send(e, timeout))?;

    let status = response.status();
    tracing::debug!(
        url = %response.url(),
        status = status.as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Outbound request completed"
    );

    if status != expect {
        let body = read_snippet(response).await;
        return Err(ClientError::UnexpectedStatus {
            got: status.as_u16(),
            want: expect.as_u16(),
            body,
        });
    }

    Ok(response)
}

/// Read at most [`ERROR_BODY_LIMIT`] bytes of the body for diagnostics.
async fn read_snippet(mut response: Response) -> String {
    let mut buf = Vec::with_capacity(ERROR_BODY_LIMIT);
    while buf.len() < ERROR_BODY_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = (ERROR_BODY_LIMIT - buf.len()).min(chunk.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Ok(None) | Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Collect the body into one buffer and decode it.
///
/// `serde_json` only decodes from a complete slice or a blocking reader, so
/// the body is gathered chunk by chunk under the call's timeout and decoded
/// once the last chunk arrives. Nothing beyond the body itself is copied.
async fn decode<T: DeserializeOwned>(response: Response, timeout: Duration) -> Result<T, ClientError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ClientError::from_send(e, timeout))?;
    serde_json::from_slice(&bytes).map_err(ClientError::Decode)
}
