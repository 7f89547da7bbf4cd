//! Inbound connection accounting.
//!
//! The tracker hands out one [`ConnectionGuard`] per accepted socket. The
//! guard numbers the connection and keeps it in the open count until the
//! connection task ends. The number is stamped on every request served over
//! that connection so access log lines from one keep-alive socket can be
//! grouped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Sequence number of an accepted connection, unique per tracker.
///
/// Inserted into request extensions by the accept loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    open: AtomicU64,
}

/// Counts accepted and open connections. Clones share the counters.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counters: Arc<Counters>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted connection; it stays open until the guard drops.
    pub fn track(&self) -> ConnectionGuard {
        let id = ConnectionId(self.counters.accepted.fetch_add(1, Ordering::Relaxed) + 1);
        let open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_connections(open);
        ConnectionGuard {
            counters: Arc::clone(&self.counters),
            id,
        }
    }

    pub fn active_count(&self) -> u64 {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Connections accepted since the tracker was created.
    pub fn accepted_count(&self) -> u64 {
        self.counters.accepted.load(Ordering::Relaxed)
    }
}

/// Held by the connection task for as long as the socket is served.
#[derive(Debug)]
pub struct ConnectionGuard {
    counters: Arc<Counters>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let open = self.counters.open.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_active_connections(open);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
