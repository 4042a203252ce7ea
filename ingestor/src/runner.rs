//! Process startup and the three concurrent loops.

use anyhow::{Context, Result};
use shared::{Config, Timeframe};
use std::sync::Arc;
use tracing::info;

use crate::poller::TimeframePoller;
use crate::provider::{HistoryProvider, YahooProvider};
use crate::store::PgBarStore;
use crate::symbols::fetch_symbols;

/// Applies the schema, loads the symbol set and runs every timeframe loop.
/// Returns only if startup fails.
pub async fn run(config: Config) -> Result<()> {
    shared::prepare_schema(&config.database, &config.ddl_path)
        .await
        .context("failed to prepare database schema")?;

    let symbols: Arc<[String]> = fetch_symbols(&config.symbols_url)
        .await
        .context("failed to load S&P 500 symbol list")?
        .into();

    // the blocking client must not be built on an async worker
    let base_url = config.provider_base_url.clone();
    let timeout = config.provider_timeout;
    let provider = tokio::task::spawn_blocking(move || YahooProvider::new(base_url, timeout))
        .await?
        .context("failed to build provider client")?;
    let provider: Arc<dyn HistoryProvider> = Arc::new(provider);

    info!(
        "Polling {} symbols from {} for {}",
        symbols.len(),
        provider.name(),
        Timeframe::ALL.map(|tf| tf.label()).join(", ")
    );

    let [daily, hourly, five_minute] = Timeframe::ALL.map(|timeframe| {
        TimeframePoller::new(
            timeframe,
            symbols.clone(),
            provider.clone(),
            PgBarStore::new(config.database.connect_options()),
        )
    });

    tokio::join!(daily.run(), hourly.run(), five_minute.run());
    Ok(())
}
