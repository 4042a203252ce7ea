//! SP500 bar ingestor
//!
//! Polls daily, hourly and 5-minute OHLCV history for the S&P 500 constituents
//! and writes it into PostgreSQL with conflict-free inserts.
//!
//! - [`symbols`]: constituents list, loaded once at startup
//! - [`provider`] / [`fetcher`]: blocking history provider and its async bridge
//! - [`store`]: per-cycle database sessions
//! - [`poller`]: the retry-forever loop of one timeframe
//! - [`runner`]: startup and the three concurrent loops

pub mod build_info;
pub mod fetcher;
pub mod poller;
pub mod provider;
pub mod runner;
pub mod store;
pub mod symbols;

pub use poller::{CycleOutcome, CycleStats, TimeframePoller};
pub use provider::{HistoryProvider, ProviderError};
pub use store::{BarRow, BarSession, BarStore, PgBarStore, StoreReport};
