mod client;

use tracing::error;
use tracing_subscriber::EnvFilter;

use client::{RelayWatcher, DEFAULT_RELAY_URL};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&log_level))
        .init();

    let url = std::env::var("RELAY_URL").unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string());

    if let Err(e) = RelayWatcher::new(url).run().await {
        error!("Watcher stopped: {e}");
        std::process::exit(1);
    }
}
