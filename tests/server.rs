mod common;

use axum::{body::Bytes, http::StatusCode, routing::{get, post}};
use secure_http::config::{DefaultPaths, RateLimitConfig};
use secure_http::http::{Envelope, X_REQUEST_ID};
use secure_http::lifecycle::ServerState;
use secure_http::security::SECURITY_HEADERS;
use secure_http::{ServerConfig, ServerError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::Extension;
use futures_util::future::join_all;
use secure_http::health::NOT_FOUND_DETAIL;
use secure_http::net::ConnectionId;

use common::{client, spawn_server};

async fn explode() -> &'static str {
    panic!("handler exploded on purpose")
}

async fn envelope(response: reqwest::Response) -> Envelope {
    response.json().await.unwrap()
}

#[tokio::test]
async fn every_response_has_request_id_matching_error_envelope() {
    let server = spawn_server(ServerConfig::default(), |s| s).await;

    let ok = client().get(server.url("/status")).send().await.unwrap();
    assert!(!ok.headers()[X_REQUEST_ID].is_empty());

    let missing = client().get(server.url("/no/such/page")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let id = missing.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
    assert!(!id.is_empty());

    let body = envelope(missing).await;
    assert!(body.data.is_none());
    assert_eq!(body.errors.len(), 1);
    assert_eq!(body.errors[0].id, id);
    assert_eq!(body.errors[0].code, "HTTP-404");
    assert_eq!(body.errors[0].title, "not found");
    assert_eq!(body.errors[0].status, 404);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn probes_and_status_version() {
    let config = ServerConfig {
        app_version: "v9.9.9".to_string(),
        ..ServerConfig::default()
    };
    let server = spawn_server(config, |s| s).await;

    let status: serde_json::Value = client()
        .get(server.url("/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status, serde_json::json!({ "AppVersion": "v9.9.9" }));

    for path in ["/healthz", "/readyz", "/upstart"] {
        let response = client().get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn path_overrides_do_not_depend_on_status_override() {
    let config = ServerConfig {
        default_paths: DefaultPaths {
            status: String::new(),
            health: "/live".to_string(),
            ready: String::new(),
            upstart: "/started".to_string(),
            oas: String::new(),
        },
        ..ServerConfig::default()
    };
    let server = spawn_server(config, |s| s).await;

    for (path, expected) in [
        ("/status", StatusCode::OK),
        ("/live", StatusCode::OK),
        ("/readyz", StatusCode::OK),
        ("/started", StatusCode::OK),
        ("/healthz", StatusCode::NOT_FOUND),
        ("/upstart", StatusCode::NOT_FOUND),
    ] {
        let response = client().get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), expected, "{path}");
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn third_request_in_window_is_rate_limited() {
    let config = ServerConfig {
        rate_limit: RateLimitConfig {
            enabled: true,
            duration_secs: 1,
            size: 2,
            skip_successful_requests: false,
        },
        ..ServerConfig::default()
    };
    let server = spawn_server(config, |s| s).await;

    for _ in 0..2 {
        let response = client().get(server.url("/status")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let limited = client().get(server.url("/status")).send().await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));
    let id = limited.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
    let body = envelope(limited).await;
    assert_eq!(body.errors[0].code, "HTTP-429");
    assert_eq!(body.errors[0].id, id);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let after = client().get(server.url("/status")).send().await.unwrap();
    assert_eq!(after.status(), StatusCode::OK);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn only_failures_count_when_skipping_successful_requests() {
    let config = ServerConfig {
        rate_limit: RateLimitConfig {
            enabled: true,
            duration_secs: 60,
            size: 1,
            skip_successful_requests: true,
        },
        ..ServerConfig::default()
    };
    let server = spawn_server(config, |s| s).await;

    for _ in 0..5 {
        let response = client().get(server.url("/status")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let failed = client().get(server.url("/missing")).send().await.unwrap();
    assert_eq!(failed.status(), StatusCode::NOT_FOUND);

    let limited = client().get(server.url("/status")).send().await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn panic_is_recovered_and_server_keeps_serving() {
    let server = spawn_server(ServerConfig::default(), |s| s.route("/boom", get(explode))).await;

    let response = client().get(server.url("/boom")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
    let body = envelope(response).await;
    assert_eq!(body.errors[0].code, "HTTP-500");
    assert_eq!(body.errors[0].id, id);

    for _ in 0..3 {
        let response = client().get(server.url("/status")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn security_headers_on_every_response() {
    let server = spawn_server(ServerConfig::default(), |s| s).await;

    for path in ["/status", "/missing"] {
        let response = client().get(server.url(path)).send().await.unwrap();
        for (name, value) in SECURITY_HEADERS {
            assert_eq!(response.headers()[name], value, "{path} {name}");
        }
        assert_eq!(response.headers()["server"], "secure-http");
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn cors_preflight_only_when_enabled() {
    let preflight = |url: String| {
        client()
            .request(reqwest::Method::OPTIONS, url)
            .header("origin", "https://app.example")
            .header("access-control-request-method", "POST")
            .send()
    };

    let disabled = spawn_server(ServerConfig::default(), |s| s).await;
    let response = preflight(disabled.url("/status")).await.unwrap();
    assert!(response.headers().get("access-control-allow-origin").is_none());
    disabled.stop().await.unwrap();

    let mut config = ServerConfig::default();
    config.cors.enabled = true;
    let enabled = spawn_server(config, |s| s).await;
    let response = preflight(enabled.url("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert!(response.headers().contains_key(X_REQUEST_ID));
    enabled.stop().await.unwrap();
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let config = ServerConfig {
        body_limit: 16,
        ..ServerConfig::default()
    };
    let server = spawn_server(config, |s| {
        s.route("/upload", post(|body: Bytes| async move { body.len().to_string() }))
    })
    .await;

    let small = client().post(server.url("/upload")).body("tiny").send().await.unwrap();
    assert_eq!(small.status(), StatusCode::OK);

    let large = client()
        .post(server.url("/upload"))
        .body(vec![b'x'; 100])
        .send()
        .await
        .unwrap();
    assert_eq!(large.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let id = large.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
    let body = envelope(large).await;
    assert_eq!(body.errors[0].code, "HTTP-413");
    assert_eq!(body.errors[0].id, id);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn profiling_endpoints_only_when_enabled() {
    let disabled = spawn_server(ServerConfig::default(), |s| s).await;
    let response = client().get(disabled.url("/debug/pprof/runtime")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    disabled.stop().await.unwrap();

    let config = ServerConfig {
        enable_profiling: true,
        ..ServerConfig::default()
    };
    let enabled = spawn_server(config, |s| s).await;
    let response = client().get(enabled.url("/debug/pprof/runtime")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = envelope(response).await;
    let data = body.data.unwrap();
    assert!(data["active_connections"].as_u64().unwrap() >= 1);
    assert!(data["accepted_connections"].as_u64().unwrap() >= 1);
    assert!(data["pid"].as_u64().is_some());

    let index = client().get(enabled.url("/debug/pprof/")).send().await.unwrap();
    assert_eq!(index.status(), StatusCode::OK);
    enabled.stop().await.unwrap();
}

#[tokio::test]
async fn shutdown_runs_callback_once_and_drains_in_flight_requests() {
    let calls = Arc::new(AtomicUsize::new(0));
    let connected_during_callback = Arc::new(AtomicBool::new(false));
    let server_addr: Arc<OnceLock<SocketAddr>> = Arc::default();

    let server = {
        let calls = calls.clone();
        let connected = connected_during_callback.clone();
        let server_addr = server_addr.clone();
        spawn_server(ServerConfig::default(), move |mut s| {
            s.defer_close(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                let reachable = server_addr
                    .get()
                    .is_some_and(|addr| std::net::TcpStream::connect(addr).is_ok());
                connected.store(reachable, Ordering::SeqCst);
            });
            s.route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    "finished"
                }),
            )
        })
        .await
    };
    server_addr.set(server.addr).unwrap();

    let url = server.url("/slow");
    let in_flight = tokio::spawn(async move {
        client().get(url).send().await.unwrap().text().await.unwrap()
    });
    tokio::time::sleep(Duration::from_millis(150)).await;

    let state = server.state.clone();
    let shutdown = server.shutdown.clone();
    let result = server.stop().await;
    assert!(!shutdown.trigger());

    assert!(result.is_ok(), "{result:?}");
    assert_eq!(in_flight.await.unwrap(), "finished");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(connected_during_callback.load(Ordering::SeqCst));
    assert_eq!(*state.borrow(), ServerState::Stopped);
}

#[tokio::test]
async fn shutdown_past_deadline_is_fatal() {
    let config = ServerConfig {
        shutdown_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let server = spawn_server(config, |s| {
        s.route(
            "/stuck",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too late"
            }),
        )
    })
    .await;

    let url = server.url("/stuck");
    tokio::spawn(async move {
        let _ = client().get(url).send().await;
    });
    tokio::time::sleep(Duration::from_millis(150)).await;

    let state = server.state.clone();
    let result = server.stop().await;
    assert!(matches!(result, Err(ServerError::ShutdownTimeout(_))), "{result:?}");
    assert_eq!(*state.borrow(), ServerState::Fatal);
}

#[tokio::test]
async fn oas_document_is_served() {
    let server = spawn_server(ServerConfig::default(), |mut s| {
        s.set_oas(r#"{"openapi":"3.0.3"}"#);
        s
    })
    .await;

    let response = client().get(server.url("/oas/spec.json")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.text().await.unwrap(), r#"{"openapi":"3.0.3"}"#);

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_cannot_exceed_the_window() {
    let config = ServerConfig {
        rate_limit: RateLimitConfig {
            enabled: true,
            duration_secs: 60,
            size: 1,
            skip_successful_requests: true,
        },
        ..ServerConfig::default()
    };
    let server = spawn_server(config, |s| {
        s.route(
            "/login",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                StatusCode::UNAUTHORIZED
            }),
        )
    })
    .await;

    let http = client();
    let attempts = (0..10).map(|_| http.get(server.url("/login")).send());
    let statuses: Vec<StatusCode> = join_all(attempts)
        .await
        .into_iter()
        .map(|response| response.unwrap().status())
        .collect();

    let admitted = statuses.iter().filter(|s| **s == StatusCode::UNAUTHORIZED).count();
    let limited = statuses.iter().filter(|s| **s == StatusCode::TOO_MANY_REQUESTS).count();
    assert_eq!(admitted, 1, "{statuses:?}");
    assert_eq!(limited, 9, "{statuses:?}");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn wrong_method_on_known_path_is_enveloped_404() {
    let server = spawn_server(ServerConfig::default(), |s| s).await;

    let response = client().post(server.url("/healthz")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["content-type"], "application/json");
    let id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();

    let body = envelope(response).await;
    assert_eq!(body.errors[0].id, id);
    assert_eq!(body.errors[0].code, "HTTP-404");
    assert_eq!(body.errors[0].detail, NOT_FOUND_DETAIL);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn bare_handler_status_is_enveloped() {
    let server = spawn_server(ServerConfig::default(), |s| {
        s.route("/forbidden", get(|| async { StatusCode::FORBIDDEN }))
    })
    .await;

    let response = client().get(server.url("/forbidden")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();

    let body = envelope(response).await;
    assert!(body.data.is_none());
    assert_eq!(body.errors[0].id, id);
    assert_eq!(body.errors[0].code, "HTTP-403");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn close_callback_time_counts_against_deadline() {
    let config = ServerConfig {
        shutdown_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let server = spawn_server(config, |mut s| {
        s.defer_close(|| std::thread::sleep(Duration::from_millis(1500)));
        s.route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(800)).await;
                "done"
            }),
        )
    })
    .await;

    let url = server.url("/slow");
    tokio::spawn(async move {
        let _ = client().get(url).send().await;
    });
    tokio::time::sleep(Duration::from_millis(150)).await;

    let state = server.state.clone();
    let result = server.stop().await;
    assert!(matches!(result, Err(ServerError::ShutdownTimeout(_))), "{result:?}");
    assert_eq!(*state.borrow(), ServerState::Fatal);
}

#[tokio::test]
async fn keep_alive_requests_share_connection_id() {
    let server = spawn_server(ServerConfig::default(), |s| {
        s.route(
            "/conn",
            get(|Extension(id): Extension<ConnectionId>| async move { id.to_string() }),
        )
    })
    .await;

    let http = client();
    let first = http.get(server.url("/conn")).send().await.unwrap().text().await.unwrap();
    let second = http.get(server.url("/conn")).send().await.unwrap().text().await.unwrap();
    assert!(first.starts_with("conn-"), "{first}");
    assert_eq!(first, second);

    let other = client().get(server.url("/conn")).send().await.unwrap().text().await.unwrap();
    assert_ne!(first, other);

    server.stop().await.unwrap();
}
