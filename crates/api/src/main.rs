use anyhow::{Context, Result};
use std::sync::Arc;

use api::{AppConfig, AppContext};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    api::init_tracing(&config.logging);

    let context = match AppContext::from_config(&config).await {
        Ok(context) => Arc::new(context),
        Err(e) => {
            tracing::error!("Start-up failed: {e:#}");
            return Err(e);
        }
    };

    let app = api::router(context);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    tracing::info!("Server listening on http://{}", config.server.bind);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
