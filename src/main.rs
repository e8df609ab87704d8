use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use hitguard::config::HitguardConfig;
use hitguard::http::HttpServer;
use hitguard::ratelimit::Sweeper;

/// Fixed-window rate limiting demo server.
#[derive(Parser, Debug)]
#[command(name = "hitguard", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Window length in seconds
    #[arg(long)]
    window_secs: Option<u64>,

    /// Requests allowed per window
    #[arg(long)]
    max_connections: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }

    info!("Starting Hitguard");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = HitguardConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if let Some(window_secs) = args.window_secs {
        config.rate_limiting.window_secs = window_secs;
    }
    if let Some(max_connections) = args.max_connections {
        config.rate_limiting.max_connections = max_connections;
    }

    let limits = &config.rate_limiting;
    info!(
        bind_addr = %config.server.bind_addr,
        window_secs = limits.window_secs,
        max_connections = limits.max_connections,
        counting_mode = ?limits.counting_mode,
        key_source = ?limits.key_source,
        "Configuration loaded"
    );

    // Initialize the hit store and its sweeper
    let store = Arc::new(limits.build_store());
    let _sweeper = Sweeper::spawn(&store, limits.sweep_interval());
    let layer = limits.layer_builder().store(store).build()?;
    info!("Rate limiter initialized");

    let server = HttpServer::new(config.server.bind_addr, layer);
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Hitguard stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
