//! Errors returned by the outbound client.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single outbound call.
///
/// Each variant keeps the underlying cause as its `source`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to create request: invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to create request: invalid header {name:?}: {source}")]
    InvalidHeader {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("marshal body failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("request timed out after {timeout:?}: {source}")]
    Timeout {
        timeout: Duration,
        #[source]
        source: reqwest::Error,
    },

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected status code: got {got}, want {want}; body: {body:?}")]
    UnexpectedStatus { got: u16, want: u16, body: String },

    #[error("unmarshal failed: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ClientError {
    pub(crate) fn from_send(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ClientError::Timeout {
                timeout,
                source: err,
            }
        } else {
            ClientError::Transport(err)
        }
    }

    /// Returns `true` for a status mismatch.
    pub fn is_status(&self) -> bool {
        matches!(self, ClientError::UnexpectedStatus { .. })
    }

    /// Returns `true` when the call hit its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }
}
