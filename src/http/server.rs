//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Assemble the axum Router: probes, application routes, OpenAPI
//!   document, 404 fallback, framework limits and the middleware chain
//! - Bind the listener and serve HTTP/1.1 and HTTP/2
//! - Run the registered cleanup callback exactly once before shutdown
//! - Drain in-flight requests within the shutdown deadline

use axum::{
    body::Bytes,
    extract::DefaultBodyLimit,
    routing::MethodRouter,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot, watch};
use tower_http::{
    limit::RequestBodyLimitLayer,
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
};

use crate::config::{validate_config, ConfigError, ServerConfig};
use crate::health::{not_found, oas_route, probe_routes};
use crate::http::middleware::MiddlewareChain;
use crate::http::request::{IdGenerator, UuidGenerator};
use crate::lifecycle::{spawn_signal_listener, ServerState, Shutdown, StateCell};
use crate::net::{accept_loop, bind, ConnectionSettings, ConnectionTracker, ListenerError};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("listener stopped unexpectedly")]
    ListenerClosed,

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

type CloseFn = Box<dyn FnOnce() + Send + 'static>;

/// Inbound HTTP server.
pub struct HttpServer {
    config: ServerConfig,
    chain: MiddlewareChain,
    routes: Router,
    oas: Option<Bytes>,
    on_close: Option<CloseFn>,
    state: StateCell,
    connections: ConnectionTracker,
}

impl HttpServer {
    /// Validate `config` and resolve the middleware chain.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let metrics_handle = if config.observability.metrics_enabled {
            metrics::install_recorder()
        } else {
            None
        };

        let connections = ConnectionTracker::new();
        let chain = MiddlewareChain::from_config(
            &config,
            Arc::new(UuidGenerator),
            connections.clone(),
            metrics_handle,
        );

        tracing::info!(
            app_version = %config.app_version,
            body_limit = config.effective_body_limit(),
            prefork = config.prefork,
            stages = ?chain.stages().iter().map(|stage| stage.name()).collect::<Vec<_>>(),
            "HTTP server configured"
        );

        Ok(Self {
            config,
            chain,
            routes: Router::new(),
            oas: None,
            on_close: None,
            state: StateCell::new(),
            connections,
        })
    }

    /// Replace the request ID generator.
    pub fn with_id_generator(mut self, ids: impl IdGenerator) -> Self {
        self.chain.set_id_generator(Arc::new(ids));
        self
    }

    /// Register an application route.
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.routes = self.routes.route(path, method_router);
        self
    }

    /// Merge a stateless application router.
    pub fn merge(mut self, router: Router) -> Self {
        self.routes = self.routes.merge(router);
        self
    }

    /// Serve `document` verbatim as JSON on the configured OAS path.
    pub fn set_oas(&mut self, document: impl Into<Bytes>) {
        self.oas = Some(document.into());
    }

    /// Register the cleanup callback run right before shutdown begins.
    ///
    /// Only one callback is kept; a later registration replaces the earlier.
    pub fn defer_close<F>(&mut self, on_close: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.on_close.replace(Box::new(on_close)).is_some() {
            tracing::debug!("Replacing previously registered close callback");
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    pub fn state_watcher(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    pub fn connections(&self) -> ConnectionTracker {
        self.connections.clone()
    }

    /// The fully assembled router.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let paths = &self.config.default_paths;

        let mut app = probe_routes(paths, &self.config.app_version).merge(self.routes.clone());
        if let Some(document) = &self.oas {
            app = app.merge(oas_route(paths.oas_path(), document.clone()));
        }

        let mut app = app
            .fallback(not_found)
            .method_not_allowed_fallback(not_found)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.effective_body_limit()));
        if let Some(read_timeout) = self.config.read_timeout() {
            app = app.layer(RequestBodyTimeoutLayer::new(read_timeout));
        }
        if let Some(write_timeout) = self.config.write_timeout() {
            app = app.layer(TimeoutLayer::new(write_timeout));
        }

        self.chain.apply(app)
    }

    /// Bind `0.0.0.0:port` and serve until `shutdown` fires.
    pub async fn run(self, port: u16, shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match bind(addr, self.config.prefork) {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, "Failed to start server");
                self.state.set(ServerState::Fatal);
                return Err(e.into());
            }
        };
        self.serve(listener, shutdown).await
    }

    /// Like [`HttpServer::run`], shutting down on SIGINT or SIGTERM.
    pub async fn run_until_signal(self, port: u16) -> Result<(), ServerError> {
        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();
        let signals = spawn_signal_listener(shutdown);

        let result = self.run(port, receiver).await;
        signals.abort();
        result
    }

    /// Serve on an already bound listener until `shutdown` fires.
    ///
    /// A listener failure before the signal is fatal. After the signal the
    /// close callback runs, the listener closes and in-flight requests are
    /// drained. `shutdown_timeout_secs` bounds the callback and the drain
    /// together.
    pub async fn serve(
        mut self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let settings = ConnectionSettings {
            header_read_timeout: self.config.read_timeout(),
            max_buf_size: (self.config.read_buffer_size > 0).then_some(self.config.read_buffer_size),
            http2_max_send_buf_size: (self.config.write_buffer_size > 0)
                .then_some(self.config.write_buffer_size),
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let mut acceptor = tokio::spawn(accept_loop(
            listener,
            self.router(),
            settings,
            self.connections.clone(),
            stop_rx,
        ));

        self.state.set(ServerState::Listening);
        tracing::info!(address = %addr, "HTTP server listening");

        tokio::select! {
            result = &mut acceptor => {
                let err = match result {
                    Ok(Ok(())) => ServerError::ListenerClosed,
                    Ok(Err(e)) => e.into(),
                    Err(e) => e.into(),
                };
                tracing::error!(error = %err, "Server error");
                self.state.set(ServerState::Fatal);
                return Err(err);
            }
            _ = shutdown.recv() => {}
        }

        self.state.set(ServerState::ShuttingDown);
        tracing::info!("Shutting down server...");

        // The close callback runs on the shutdown clock.
        let deadline = self.config.shutdown_timeout();
        let expires = tokio::time::Instant::now() + deadline;

        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
        let _ = stop_tx.send(());

        let outcome = match tokio::time::timeout_at(expires, &mut acceptor).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(e.into()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                acceptor.abort();
                Err(ServerError::ShutdownTimeout(deadline))
            }
        };

        match outcome {
            Ok(()) => {
                self.state.set(ServerState::Stopped);
                tracing::info!("Server stopped cleanly");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Server shutdown failed");
                self.state.set(ServerState::Fatal);
                Err(e)
            }
        }
    }
}
