//! Historical bar providers
//!
//! A provider answers one blocking request per (symbol, timeframe). Callers
//! inside the async loops go through [`crate::fetcher::fetch_bars`], which moves
//! the call onto the blocking pool.

pub mod yahoo;

pub use yahoo::YahooProvider;

use shared::{Bar, Timeframe};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Http(u16),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub trait HistoryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetches the timeframe's full lookback window for one symbol. Blocking.
    fn history(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, ProviderError>;
}
