use spagate::assets::StaticAssets;
use spagate::config::{Config, DeploymentContext};
use spagate::forward::Forwarder;
use spagate::server::EdgeServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Version information for the gateway
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spagate=debug".parse().expect("valid log directive")),
        )
        .init();

    // Load configuration; the default config file is optional
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let mut config = match config_path {
        Some(ref path) => Config::load(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to load configuration");
            e
        })?,
        None => Config::load_or_default("config.toml")?,
    };
    config.apply_env();

    // The deployment context is read exactly once; everything downstream
    // works from the resolved value
    let context = DeploymentContext::from_env().map_err(|e| {
        error!(error = %e, "Failed to resolve deployment context");
        e
    })?;

    print_startup_banner(&config, &context);

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let forwarder = Arc::new(Forwarder::new(&context, &config.upstream)?);
    let assets = Arc::new(StaticAssets::new(&config.assets.dir, &config.assets.index));

    let bind_addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .map_err(|e| {
            error!(bind = %config.server.bind, port = config.server.port, error = %e, "Invalid bind address");
            anyhow::anyhow!("Invalid bind address: {}", e)
        })?;

    let server = EdgeServer::new(
        bind_addr,
        forwarder,
        assets,
        config.server.max_body_bytes,
        shutdown_rx,
    );

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!(error = %e, "Edge server error");
        }
    });

    // Wait for shutdown signal (Ctrl+C or SIGTERM)
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT (Ctrl+C), shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down...");
    }

    // Signal shutdown
    let _ = shutdown_tx.send(true);

    // Wait for the server to stop (with timeout)
    let _ = tokio::time::timeout(Duration::from_secs(5), server_handle).await;

    info!("Shutdown complete");
    Ok(())
}

fn print_startup_banner(config: &Config, context: &DeploymentContext) {
    info!(name = PKG_NAME, version = VERSION, "Starting edge gateway");
    info!(
        bind = %config.server.bind,
        port = config.server.port,
        max_body_bytes = config.server.max_body_bytes,
        "Server configuration"
    );
    info!(
        context = %context,
        target = %context.base_url(config.upstream.local_port),
        request_timeout_secs = config.upstream.request_timeout_secs,
        "Upstream API target"
    );
    info!(
        dir = %config.assets.dir,
        index = %config.assets.index,
        "Static asset settings"
    );
}
