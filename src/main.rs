//! Demo service built on the `secure_http` library.
//!
//! ```text
//!     Client Request
//!     ─────────────▶ net::listener ─▶ middleware chain ─▶ probes / app routes
//!                                     (request id, recover, security headers,
//!                                      cors, rate limit, profiling, tracing,
//!                                      access log)
//! ```
//!
//! Usage: `secure-http [--config FILE] [--port N]`

use axum::{routing::get, Json};
use clap::Parser;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

use secure_http::config::{load_config, ServerConfig};
use secure_http::http::{success_response, ApiError, HttpServer, RequestId};
use secure_http::observability::try_init_logging;

#[derive(Parser)]
#[command(name = "secure-http")]
#[command(about = "Demo HTTP service with the secure middleware chain", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value_t = 8008)]
    port: u16,
}

const DEMO_OAS: &str = r#"{"openapi":"3.0.3","info":{"title":"secure-http demo","version":"local"},"paths":{}}"#;

async fn hello(id: RequestId) -> axum::response::Response {
    success_response(json!({ "message": "hello", "request_id": id.as_str() }))
}

async fn echo(Json(body): Json<Value>) -> Result<Json<Value>, ApiError> {
    if body.is_null() {
        return Err(ApiError::bad_request("body must not be null"));
    }
    Ok(Json(body))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration from {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig {
            app_version: "local".to_string(),
            enable_profiling: true,
            ..ServerConfig::default()
        },
    };

    if let Err(e) = try_init_logging(&config.observability) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "secure-http starting");

    let mut server = match HttpServer::new(config) {
        Ok(server) => server
            .route("/hello", get(hello))
            .route("/echo", axum::routing::post(echo)),
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    server.set_oas(DEMO_OAS);
    server.defer_close(|| tracing::info!("Releasing resources before shutdown"));

    match server.run_until_signal(args.port).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server exited with error");
            ExitCode::FAILURE
        }
    }
}
