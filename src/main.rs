use anyhow::{Context, Result};
use axum::Router;
use bucketfs::{FsStore, config::AppConfig, routes};
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting bucketfs with config: {:?}", cfg);

    // --- Ensure store root exists ---
    if !cfg.root_dir.exists() {
        tokio::fs::create_dir_all(&cfg.root_dir)
            .await
            .with_context(|| format!("creating store root {}", cfg.root_dir.display()))?;
        tracing::info!("Created store root at {}", cfg.root_dir.display());
    }

    let store = FsStore::new(cfg.root_dir.clone());
    let app: Router = routes::routes::routes().with_state(store);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
