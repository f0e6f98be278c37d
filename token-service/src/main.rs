use anyhow::{Context, Result};
use token_service::{build_app, load_service_config};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_service_config().context("Failed to load token-service configuration")?;
    let addr = config.bind_addr()?;
    let path = config.endpoint_path.clone();
    let app = build_app(config)?;

    info!(%addr, %path, "starting token-service");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
