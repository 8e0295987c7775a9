use anyhow::Result;
use clinical_bridge::{config::Config, server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinical_bridge=info".parse()?),
        )
        .init();

    info!("Starting clinical translation bridge");

    // Load configuration from environment
    let config = Config::from_env()?;

    let state = server::AppState::from_config(&config).await?;
    server::serve(&config, state).await
}
