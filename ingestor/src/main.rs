use anyhow::Result;
use ingestor::{build_info, runner};
use shared::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // loads .env first so RUST_LOG from it applies
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting {}", build_info::describe());

    runner::run(config).await
}
