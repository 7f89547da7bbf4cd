use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::time::Duration;

use secure_http::client::{HttpClient, RequestOptions};
use secure_http::config::{ClientConfig, DefaultPaths};
use secure_http::health::StatusBody;

#[derive(Parser)]
#[command(name = "probe-cli")]
#[command(about = "Probe the operational endpoints of a secure-http service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8008")]
    url: String,

    /// Override the endpoint path
    #[arg(short, long)]
    path: Option<String>,

    /// Request timeout in seconds
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the reported application version
    Status,
    /// Liveness probe
    Health,
    /// Readiness probe
    Ready,
    /// Startup probe
    Upstart,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match probe(cli).await {
        Ok(line) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn probe(cli: Cli) -> Result<String, Box<dyn std::error::Error>> {
    let client = HttpClient::new(&ClientConfig::default())?;
    let defaults = DefaultPaths::default();

    let default_path = match cli.command {
        Commands::Status => defaults.status_path(),
        Commands::Health => defaults.health_path(),
        Commands::Ready => defaults.ready_path(),
        Commands::Upstart => defaults.upstart_path(),
    };
    let path = cli.path.as_deref().unwrap_or(default_path);
    let url = format!("{}{}", cli.url.trim_end_matches('/'), path);
    let options = RequestOptions::get(url.as_str()).timeout(Duration::from_secs(cli.timeout));

    match cli.command {
        Commands::Status => {
            let status: StatusBody = client.execute_json(options).await?;
            Ok(format!("AppVersion: {}", status.app_version))
        }
        Commands::Health | Commands::Ready | Commands::Upstart => {
            client.execute(options).await?;
            Ok(format!("{url}: OK"))
        }
    }
}
