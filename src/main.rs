//! lume-server: static frontend plus a hardened contact API.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ request id ─▶ trace ─▶ security headers ─▶ origin guard ─▶ CORS
//!                                                                          │
//!        ┌─────────────────────────────────────────────────────────────────┘
//!        ▼
//!   pipeline: body (10 KB) ─▶ xss ─▶ injection ─▶ pollution ─▶ rate limit (/api/)
//!        │
//!        ▼
//!   router: /health │ /api/contact ─▶ ContactHandler │ static files ─▶ 404
//!        │
//!        ▼
//!   ApiError ─▶ {"error": "Server error"}
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use lume_server::config::{resolve_config, ConfigOverrides};
use lume_server::http::{AppServer, LogContactHandler};
use lume_server::lifecycle::Shutdown;
use lume_server::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "lume-server", version, about = "Static site and contact API server")]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, env = "LUME_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// The single origin allowed to call the API.
    #[arg(long, env = "CORS_ORIGIN")]
    cors_origin: Option<String>,

    /// Directory holding the static frontend.
    #[arg(long, env = "STATIC_ROOT")]
    static_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        port: cli.port,
        cors_origin: cli.cors_origin,
        static_root: cli.static_root,
    };
    let config = resolve_config(cli.config.as_deref(), overrides)?;

    logging::init(&config.observability.log_level);

    tracing::info!(
        port = config.listener.port,
        allowed_origin = %config.cors.allowed_origin,
        max_body_bytes = config.limits.max_body_bytes,
        rate_limit_max = config.rate_limit.max_requests,
        rate_limit_window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    let port = listener.local_addr()?.port();
    tracing::info!(port, "Server running on port {port}");

    let shutdown = Shutdown::new();
    let server = AppServer::new(config, Arc::new(LogContactHandler))?;
    let server_shutdown = shutdown.subscribe();

    shutdown.trigger_on_signal();

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
