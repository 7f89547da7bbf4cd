//! Sliding-window rate limiting keyed by client IP.
//!
//! Each client keeps the timestamps of its counted requests inside the
//! window. Every admitted request takes a slot before the handler runs.
//! With `skip_successful_requests`, the slot is handed back once the
//! response turns out successful (< 400).

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::http::request::client_ip;
use crate::http::response::ApiError;
use crate::observability::metrics;

/// Key used when the peer address is unknown.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Tracked clients above which empty windows are swept after a request.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

#[derive(Debug)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: usize,
    skip_successful: bool,
    clients: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: usize, skip_successful: bool) -> Self {
        Self {
            window,
            max_requests,
            skip_successful,
            clients: DashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.window(),
            config.max_requests(),
            config.skip_successful_requests,
        )
    }

    pub fn skips_successful(&self) -> bool {
        self.skip_successful
    }

    /// Check and, when allowed, count in one step.
    pub fn try_acquire(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut timestamps = self.clients.entry(key.to_string()).or_default();
        let decision = self.decide(&mut timestamps, now);
        if decision.is_allowed() {
            timestamps.push_back(now);
        }
        decision
    }

    /// Give back the most recent slot taken by `key`.
    pub fn release(&self, key: &str) {
        if let Some(mut timestamps) = self.clients.get_mut(key) {
            timestamps.pop_back();
        }
    }

    /// Drop expired timestamps and forget clients with empty windows.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.clients.retain(|_, timestamps| {
            self.prune(timestamps, now);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    fn maybe_sweep(&self) {
        if self.clients.len() > SWEEP_THRESHOLD {
            self.cleanup();
        }
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn decide(&self, timestamps: &mut VecDeque<Instant>, now: Instant) -> RateDecision {
        self.prune(timestamps, now);
        if timestamps.len() < self.max_requests {
            return RateDecision::Allowed;
        }
        let retry_after = timestamps
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(self.window);
        RateDecision::Limited { retry_after }
    }
}

/// Rate limit stage.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<SlidingWindowLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_ip(&request)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    if let RateDecision::Limited { retry_after } = limiter.try_acquire(&key) {
        tracing::warn!(client = %key, retry_after_ms = retry_after.as_millis() as u64, "Rate limit exceeded");
        metrics::record_rate_limited();

        let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
        let mut response = ApiError::too_many_requests("rate limit exceeded").into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        return response;
    }

    let response = next.run(request).await;

    if limiter.skips_successful() && response.status().as_u16() < 400 {
        limiter.release(&key);
    }
    limiter.maybe_sweep();

    response
}
