//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server
//! bootstrap and the outbound client. All types derive Serde traits so a
//! config can be built in code or deserialized from a TOML file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default request body limit (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Default rate limit window.
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(1);

/// Default maximum requests per rate limit window.
pub const DEFAULT_RATE_SIZE: u32 = 500;

pub const DEFAULT_CORS_ORIGINS: &str = "*";
pub const DEFAULT_CORS_METHODS: &str = "OPTIONS,GET,POST";
pub const DEFAULT_CORS_HEADERS: &str = "Content-Type,Authorization,Cookie,X-Real-IP,X-Forwarded-For";

pub const DEFAULT_STATUS_PATH: &str = "/status";
pub const DEFAULT_HEALTH_PATH: &str = "/healthz";
pub const DEFAULT_READY_PATH: &str = "/readyz";
pub const DEFAULT_UPSTART_PATH: &str = "/upstart";
pub const DEFAULT_OAS_PATH: &str = "/oas/spec.json";

/// Root configuration for the inbound server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Maximum request body size in bytes (0 = 1 MiB).
    pub body_limit: usize,

    /// Per-connection read buffer size in bytes (0 = hyper default).
    pub read_buffer_size: usize,

    /// HTTP/2 send buffer size in bytes (0 = hyper default).
    pub write_buffer_size: usize,

    /// Bind with SO_REUSEPORT so several processes can share the port.
    pub prefork: bool,

    /// Expose `/debug/pprof` diagnostics.
    pub enable_profiling: bool,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// CORS configuration.
    pub cors: CorsConfig,

    /// Version string reported by the status endpoint.
    pub app_version: String,

    /// Request read timeout in seconds (0 = none).
    pub read_timeout_secs: u64,

    /// Response write timeout in seconds (0 = none).
    pub write_timeout_secs: u64,

    /// Paths of the operational endpoints.
    pub default_paths: DefaultPaths,

    /// Value of the `Server` response header.
    pub server_header: String,

    /// Deadline for graceful shutdown in seconds.
    pub shutdown_timeout_secs: u64,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            body_limit: 0,
            read_buffer_size: 0,
            write_buffer_size: 0,
            prefork: false,
            enable_profiling: false,
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            app_version: String::new(),
            read_timeout_secs: 0,
            write_timeout_secs: 0,
            default_paths: DefaultPaths::default(),
            server_header: "secure-http".to_string(),
            shutdown_timeout_secs: 10,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Effective body limit, substituting the default for zero.
    pub fn effective_body_limit(&self) -> usize {
        if self.body_limit == 0 {
            DEFAULT_BODY_LIMIT
        } else {
            self.body_limit
        }
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_secs > 0).then(|| Duration::from_secs(self.write_timeout_secs))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sliding window length in seconds (0 = 1s).
    pub duration_secs: u64,

    /// Maximum counted requests per client within the window (0 = 500).
    pub size: u32,

    /// Only failed responses (status >= 400) consume budget.
    pub skip_successful_requests: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_secs: 0,
            size: 0,
            skip_successful_requests: true,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        if self.duration_secs == 0 {
            DEFAULT_RATE_WINDOW
        } else {
            Duration::from_secs(self.duration_secs)
        }
    }

    pub fn max_requests(&self) -> usize {
        if self.size == 0 {
            DEFAULT_RATE_SIZE as usize
        } else {
            self.size as usize
        }
    }
}

/// CORS configuration. Lists are comma separated.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub methods: String,
    pub origins: String,
    pub headers: String,
}

impl CorsConfig {
    pub fn effective_origins(&self) -> &str {
        non_empty_or(&self.origins, DEFAULT_CORS_ORIGINS)
    }

    pub fn effective_methods(&self) -> &str {
        non_empty_or(&self.methods, DEFAULT_CORS_METHODS)
    }

    pub fn effective_headers(&self) -> &str {
        non_empty_or(&self.headers, DEFAULT_CORS_HEADERS)
    }
}

/// Paths of the operational endpoints.
///
/// An empty field falls back to its own default, independently of the others.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultPaths {
    pub status: String,
    pub health: String,
    pub ready: String,
    pub upstart: String,
    pub oas: String,
}

impl Default for DefaultPaths {
    fn default() -> Self {
        Self {
            status: DEFAULT_STATUS_PATH.to_string(),
            health: DEFAULT_HEALTH_PATH.to_string(),
            ready: DEFAULT_READY_PATH.to_string(),
            upstart: DEFAULT_UPSTART_PATH.to_string(),
            oas: DEFAULT_OAS_PATH.to_string(),
        }
    }
}

impl DefaultPaths {
    pub fn status_path(&self) -> &str {
        non_empty_or(&self.status, DEFAULT_STATUS_PATH)
    }

    pub fn health_path(&self) -> &str {
        non_empty_or(&self.health, DEFAULT_HEALTH_PATH)
    }

    pub fn ready_path(&self) -> &str {
        non_empty_or(&self.ready, DEFAULT_READY_PATH)
    }

    pub fn upstart_path(&self) -> &str {
        non_empty_or(&self.upstart, DEFAULT_UPSTART_PATH)
    }

    pub fn oas_path(&self) -> &str {
        non_empty_or(&self.oas, DEFAULT_OAS_PATH)
    }

    /// All effective paths, in registration order.
    pub fn all(&self) -> [&str; 5] {
        [
            self.status_path(),
            self.health_path(),
            self.ready_path(),
            self.upstart_path(),
            self.oas_path(),
        ]
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Record request metrics into the Prometheus recorder.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: true,
        }
    }
}

/// Outbound client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound for a whole request when the call sets no timeout of its own.
    pub timeout_secs: u64,

    /// TCP/TLS connection establishment timeout.
    pub connect_timeout_secs: u64,

    /// Idle pooled connections kept per host.
    pub pool_max_idle_per_host: usize,

    /// How long an idle pooled connection is kept.
    pub pool_idle_timeout_secs: u64,

    /// `User-Agent` sent on every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 20,
            pool_idle_timeout_secs: 90,
            user_agent: format!("secure-http/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
