use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mon_relay::api::routes::{serve, ApiState};
use mon_relay::broadcast::Broadcaster;
use mon_relay::config::{Config, SUBSCRIBER_QUEUE_CAPACITY};
use mon_relay::error::Result;
use mon_relay::staleness::StalenessMonitor;
use mon_relay::state::StatusStore;
use mon_relay::types::now_ms;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!("Mon relay initializing");

    // --- Shared status and subscriber set ---
    let store = StatusStore::new(now_ms());
    let broadcaster = Broadcaster::new(SUBSCRIBER_QUEUE_CAPACITY);
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // --- Staleness monitor (background, every 30s) ---
    let monitor = StalenessMonitor::new(Arc::clone(&store), Arc::clone(&broadcaster));
    let monitor_handle = {
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { monitor.run(shutdown_rx).await })
    };

    // --- HTTP ingest, health and WebSocket stream ---
    let api_state = ApiState::new(store, broadcaster);
    let bind_addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Mon relay listening on {bind_addr}");
    info!("WebSocket: ws://{bind_addr}/ws");
    info!("HTTP ingest: http://{bind_addr}/api/monitoring");

    let server_shutdown_tx = shutdown_tx.clone();
    serve(listener, api_state, async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping relay");
        let _ = server_shutdown_tx.send(());
    })
    .await?;

    let _ = shutdown_tx.send(());
    let _ = monitor_handle.await;

    info!("Mon relay stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
