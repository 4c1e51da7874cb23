//! Serve command - runs the gateway HTTP server

use std::net::SocketAddr;

use clap::Args;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::api::create_router;
use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::observability::init_metrics;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Listen address, overriding `server.host`
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port, overriding `server.port`
    #[arg(long)]
    pub port: Option<u16>,
}

/// Run the gateway until Ctrl+C or SIGTERM
pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_logging(&config.logging);

    let metrics = init_metrics(&config.metrics);
    let state = crate::create_app_state_with_config(&config)
        .await?
        .with_metrics(metrics);
    let shutdown = state.shutdown.clone();

    let sweeper = state
        .gateway
        .rate_limiter()
        .cloned()
        .map(|limiter| limiter.spawn_sweeper(shutdown.clone()));

    let app = create_router(state, &config.metrics.path)
        .into_make_service_with_connect_info::<SocketAddr>();

    let addr = build_socket_addr(&config)?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "AI aggregator gateway listening");

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Ends in-flight streams so draining can finish.
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            warn!(error = %e, "Rate limiter sweeper ended abnormally");
        }
    }

    info!("Gateway shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}
