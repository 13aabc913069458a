use anyhow::Context;
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vitals_collector::{app, metrics, store::Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let http_addr = env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting vitals collector");

    // Initialize metrics
    metrics::init_metrics().context("failed to register metrics")?;

    let store = Arc::new(Store::new());
    let app = app(store);

    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("failed to bind to {}", http_addr))?;

    info!("HTTP server listening on {}", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
            }
        })
        .await
        .context("HTTP server error")?;

    info!("Shutting down");
    Ok(())
}
