//! Ordered inbound middleware chain.
//!
//! Stages run outermost first, in [`Stage::ORDER`]:
//!
//! ```text
//! RequestId → Recover → SecurityHeaders → Cors → RateLimit → Profiling → Tracing → AccessLog → handler
//! ```
//!
//! Ordering contract:
//! - `RequestId` is first so every later stage, log line and error envelope
//!   sees the same identifier, and it finalizes every error response.
//! - `Recover` wraps everything after it; panics never escape the chain.
//! - `SecurityHeaders` sit outside the optional stages so 429s, preflights
//!   and diagnostics carry them too.
//! - `AccessLog` is innermost and observes the handler's status and latency.
//!
//! Optional stages (`Cors`, `RateLimit`, `Profiling`) are omitted when
//! disabled; the relative order of the rest never changes.

pub mod access_log;
pub mod profiling;
pub mod recovery;

use axum::{middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::config::{CorsConfig, ServerConfig};
use crate::http::request::{request_id_middleware, IdGenerator};
use crate::net::ConnectionTracker;
use crate::observability::tracing::trace_layer;
use crate::security::{apply_security_headers, cors_layer, rate_limit_middleware, SlidingWindowLimiter};

pub use access_log::access_log_middleware;
pub use profiling::{profiling_middleware, ProfilingState, PROFILING_PREFIX};
pub use recovery::{install_panic_hook, recover_middleware};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RequestId,
    Recover,
    SecurityHeaders,
    Cors,
    RateLimit,
    Profiling,
    Tracing,
    AccessLog,
}

impl Stage {
    pub const ORDER: [Stage; 8] = [
        Stage::RequestId,
        Stage::Recover,
        Stage::SecurityHeaders,
        Stage::Cors,
        Stage::RateLimit,
        Stage::Profiling,
        Stage::Tracing,
        Stage::AccessLog,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::RequestId => "request_id",
            Stage::Recover => "recover",
            Stage::SecurityHeaders => "security_headers",
            Stage::Cors => "cors",
            Stage::RateLimit => "rate_limit",
            Stage::Profiling => "profiling",
            Stage::Tracing => "tracing",
            Stage::AccessLog => "access_log",
        }
    }
}

/// The resolved chain for one server.
#[derive(Clone)]
pub struct MiddlewareChain {
    stages: Vec<Stage>,
    ids: Arc<dyn IdGenerator>,
    server_header: String,
    cors: Option<CorsConfig>,
    limiter: Option<Arc<SlidingWindowLimiter>>,
    profiling: Option<ProfilingState>,
}

impl MiddlewareChain {
    pub fn from_config(
        config: &ServerConfig,
        ids: Arc<dyn IdGenerator>,
        connections: ConnectionTracker,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let cors = config.cors.enabled.then(|| config.cors.clone());
        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(SlidingWindowLimiter::from_config(&config.rate_limit)));
        let profiling = config
            .enable_profiling
            .then(|| ProfilingState::new(connections, metrics));

        let stages = Stage::ORDER
            .into_iter()
            .filter(|stage| match stage {
                Stage::Cors => cors.is_some(),
                Stage::RateLimit => limiter.is_some(),
                Stage::Profiling => profiling.is_some(),
                _ => true,
            })
            .collect();

        install_panic_hook();

        Self {
            stages,
            ids,
            server_header: config.server_header.clone(),
            cors,
            limiter,
            profiling,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn set_id_generator(&mut self, ids: Arc<dyn IdGenerator>) {
        self.ids = ids;
    }

    pub fn limiter(&self) -> Option<&Arc<SlidingWindowLimiter>> {
        self.limiter.as_ref()
    }

    /// Wrap `router` in every stage. The last layer added is the outermost,
    /// so stages are applied innermost first.
    pub fn apply(&self, router: Router) -> Router {
        self.stages
            .iter()
            .rev()
            .fold(router, |router, stage| self.apply_stage(*stage, router))
    }

    fn apply_stage(&self, stage: Stage, router: Router) -> Router {
        match stage {
            Stage::RequestId => router.layer(middleware::from_fn_with_state(
                Arc::clone(&self.ids),
                request_id_middleware,
            )),
            Stage::Recover => router.layer(middleware::from_fn(recover_middleware)),
            Stage::SecurityHeaders => apply_security_headers(router, &self.server_header),
            Stage::Cors => match &self.cors {
                Some(cors) => router.layer(cors_layer(cors)),
                None => router,
            },
            Stage::RateLimit => match &self.limiter {
                Some(limiter) => router.layer(middleware::from_fn_with_state(
                    Arc::clone(limiter),
                    rate_limit_middleware,
                )),
                None => router,
            },
            Stage::Profiling => match &self.profiling {
                Some(state) => router.layer(middleware::from_fn_with_state(
                    state.clone(),
                    profiling_middleware,
                )),
                None => router,
            },
            Stage::Tracing => router.layer(trace_layer()),
            Stage::AccessLog => router.layer(middleware::from_fn(access_log_middleware)),
        }
    }
}
