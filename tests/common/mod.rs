//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::Router;
use secure_http::lifecycle::ServerState;
use secure_http::{HttpServer, ServerConfig, ServerError, Shutdown};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Serve `router` on an ephemeral port as a plain backend.
pub async fn start_backend(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    addr
}

/// A secure-http server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub state: watch::Receiver<ServerState>,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for `serve` to return.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(15), self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
    }
}

/// Build a server from `config`, let `customize` register routes, and serve it.
pub async fn spawn_server<F>(config: ServerConfig, customize: F) -> TestServer
where
    F: FnOnce(HttpServer) -> HttpServer,
{
    let server = customize(HttpServer::new(config).unwrap());
    let state = server.state_watcher();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let handle = tokio::spawn(server.serve(listener, receiver));

    let mut ready = state.clone();
    tokio::time::timeout(
        Duration::from_secs(5),
        ready.wait_for(|state| *state != ServerState::Created),
    )
    .await
    .expect("server did not start")
    .expect("state channel closed");

    TestServer {
        addr,
        shutdown,
        state,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
