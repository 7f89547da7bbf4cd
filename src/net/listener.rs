//! TCP listener and accept loop.
//!
//! # Responsibilities
//! - Bind the listening socket (optionally with `SO_REUSEPORT` for prefork)
//! - Accept incoming TCP connections and serve each on its own task
//! - Apply per-connection HTTP settings (header read timeout, buffers)
//! - Drain in-flight connections once told to stop
//!
//! # Design Decisions
//! - Transient accept errors are logged and skipped
//! - File descriptor exhaustion backs off for one second instead of spinning
//! - Any other accept error ends the loop and is reported to the server

use axum::{extract::ConnectInfo, Router};
use hyper::{body::Incoming, service::service_fn, Request};
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::{conn::auto::Builder, graceful::GracefulShutdown},
};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::oneshot;
use tower::ServiceExt;

use crate::net::connection::ConnectionTracker;

/// Pending connection queue length passed to `listen(2)`.
pub const LISTEN_BACKLOG: u32 = 1024;

const EMFILE: i32 = 24;
const ENFILE: i32 = 23;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// Bind a listening socket on `addr`.
pub fn bind(addr: SocketAddr, reuse_port: bool) -> Result<TcpListener, ListenerError> {
    let bind_err = |source| ListenerError::Bind { addr, source };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;

    socket.set_reuseaddr(true).map_err(bind_err)?;

    if reuse_port {
        #[cfg(unix)]
        socket.set_reuseport(true).map_err(bind_err)?;
        #[cfg(not(unix))]
        tracing::warn!("prefork requested but SO_REUSEPORT is unavailable on this platform");
    }

    socket.bind(addr).map_err(bind_err)?;
    let listener = socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

    tracing::info!(address = %addr, reuse_port, "Listener bound");
    Ok(listener)
}

/// HTTP settings applied to every accepted connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    pub header_read_timeout: Option<Duration>,
    pub max_buf_size: Option<usize>,
    pub http2_max_send_buf_size: Option<usize>,
}

impl ConnectionSettings {
    fn builder(&self) -> Builder<TokioExecutor> {
        let mut builder = Builder::new(TokioExecutor::new());

        {
            let mut http1 = builder.http1();
            http1.timer(TokioTimer::new());
            if let Some(timeout) = self.header_read_timeout {
                http1.header_read_timeout(timeout);
            }
            if let Some(size) = self.max_buf_size {
                http1.max_buf_size(size);
            }
        }

        if let Some(size) = self.http2_max_send_buf_size {
            builder.http2().max_send_buf_size(size);
        }

        builder
    }
}

/// Accept and serve connections until `stop` fires, then drain.
///
/// Returns `Err` only when the listener itself fails. In-flight connections
/// finish their current request; the caller bounds the drain with its own
/// deadline.
pub async fn accept_loop(
    listener: TcpListener,
    router: Router,
    settings: ConnectionSettings,
    tracker: ConnectionTracker,
    mut stop: oneshot::Receiver<()>,
) -> Result<(), ListenerError> {
    let builder = settings.builder();
    let graceful = GracefulShutdown::new();

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) if is_transient(&e) => {
                    tracing::debug!(error = %e, "Transient accept error");
                    continue;
                }
                Err(e) if is_fd_exhaustion(&e) => {
                    tracing::error!(error = %e, "Out of file descriptors, pausing accept");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
                Err(e) => return Err(ListenerError::Accept(e)),
            },
            _ = &mut stop => break,
        };

        let guard = tracker.track();
        tracing::debug!(peer_addr = %peer, connection_id = %guard.id(), "Connection accepted");

        let router = router.clone();
        let connection_id = guard.id();
        let service = service_fn(move |mut request: Request<Incoming>| {
            request.extensions_mut().insert(ConnectInfo(peer));
            request.extensions_mut().insert(connection_id);
            router.clone().oneshot(request)
        });

        let conn = builder
            .serve_connection_with_upgrades(TokioIo::new(stream), service)
            .into_owned();
        let conn = graceful.watch(conn);

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(connection_id = %guard.id(), error = %e, "Connection ended with error");
            }
            drop(guard);
        });
    }

    drop(listener);
    tracing::info!("Listener closed, draining connections");
    graceful.shutdown().await;
    Ok(())
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
    )
}

fn is_fd_exhaustion(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(EMFILE) | Some(ENFILE))
}
