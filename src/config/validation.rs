//! Configuration validation.
//!
//! Serde handles syntax; this module checks values that would otherwise
//! fail later (or panic inside hyper) once the server starts. Every error
//! is collected, not just the first.

use axum::http::Method;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::ServerConfig;

/// Smallest read buffer hyper accepts.
pub const MIN_READ_BUFFER_SIZE: usize = 8192;

/// A single semantic problem in a [`ServerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("read_buffer_size must be 0 or at least {MIN_READ_BUFFER_SIZE} bytes, got {0}")]
    ReadBufferTooSmall(usize),

    #[error("{field} path must start with '/', got {value:?}")]
    RelativePath { field: &'static str, value: String },

    #[error("duplicate operational path {0:?}")]
    DuplicatePath(String),

    #[error("invalid CORS method {0:?}")]
    InvalidCorsMethod(String),

    #[error("shutdown_timeout_secs must be greater than 0")]
    ZeroShutdownTimeout,
}

/// Validate a server configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.read_buffer_size != 0 && config.read_buffer_size < MIN_READ_BUFFER_SIZE {
        errors.push(ValidationError::ReadBufferTooSmall(config.read_buffer_size));
    }

    let paths = &config.default_paths;
    let named = [
        ("status", paths.status_path()),
        ("health", paths.health_path()),
        ("ready", paths.ready_path()),
        ("upstart", paths.upstart_path()),
        ("oas", paths.oas_path()),
    ];
    for (i, &(field, value)) in named.iter().enumerate() {
        if !value.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                field,
                value: value.to_string(),
            });
        }
        if named[..i].iter().any(|&(_, earlier)| earlier == value) {
            errors.push(ValidationError::DuplicatePath(value.to_string()));
        }
    }

    if config.cors.enabled {
        for method in config.cors.effective_methods().split(',') {
            let method = method.trim();
            if method.is_empty() || Method::from_str(method).is_err() {
                errors.push(ValidationError::InvalidCorsMethod(method.to_string()));
            }
        }
    }

    if config.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
