use anyhow::{Context, Result};
use crayfish::benchmarks::BenchmarkRegistry;
use crayfish::config::ServiceConfig;
use crayfish::web_app::{build_app, AppState};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::from_env().context("Failed to read service configuration")?;
    init_logging(&config.log_level)?;

    let registry = BenchmarkRegistry::standard();
    info!(benchmarks = ?registry.names(), workers = config.workers, "Benchmarks registered");

    let addr = config.bind_addr.clone();
    let app = build_app(AppState::new(registry, config));
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Crayfish service listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Crayfish service shutting down");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for shutdown signal");
    }
}
