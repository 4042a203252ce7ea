//! Bridges blocking providers into the async loops.

use shared::{Bar, Timeframe};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::provider::HistoryProvider;

/// Fetches one symbol's window on the blocking pool. Never fails: provider
/// errors and worker panics are logged and yield an empty batch.
pub async fn fetch_bars<P>(provider: Arc<P>, symbol: &str, timeframe: Timeframe) -> Vec<Bar>
where
    P: HistoryProvider + ?Sized + 'static,
{
    let task_symbol = symbol.to_string();
    let task_provider = provider.clone();
    let result = tokio::task::spawn_blocking(move || task_provider.history(&task_symbol, timeframe)).await;

    match result {
        Ok(Ok(bars)) => {
            debug!(
                timeframe = %timeframe,
                symbol,
                count = bars.len(),
                "Fetched bars from {}",
                provider.name()
            );
            bars
        }
        Ok(Err(e)) => {
            warn!(timeframe = %timeframe, symbol, "Failed to load {} from {}: {}", symbol, provider.name(), e);
            Vec::new()
        }
        Err(e) => {
            warn!(timeframe = %timeframe, symbol, "Fetch task for {} aborted: {}", symbol, e);
            Vec::new()
        }
    }
}
