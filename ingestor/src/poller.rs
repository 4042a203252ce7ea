//! Per-timeframe polling loop
//!
//! Each [`TimeframePoller`] owns one timeframe and cycles forever:
//! connect, walk the symbol set in order (fetch, then store and commit), close,
//! sleep. A failed cycle is logged and retried after the same fixed interval;
//! there is no backoff and no resume, the next cycle starts from the first
//! symbol again.

use anyhow::Result;
use chrono::Utc;
use shared::Timeframe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::fetcher::fetch_bars;
use crate::provider::HistoryProvider;
use crate::store::{BarSession, BarStore, StoreReport};

/// Progress is logged every this many symbols.
const PROGRESS_EVERY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    IteratingSymbols,
    Sleeping,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Symbols visited, with or without data.
    pub symbols: usize,
    /// Symbols whose fetch came back empty (no data or fetch error).
    pub empty: usize,
    pub rows: StoreReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleStats),
    /// The cycle was abandoned; `stats` covers the symbols done before the error.
    Failed { stats: CycleStats, error: String },
}

impl CycleOutcome {
    pub fn stats(&self) -> &CycleStats {
        match self {
            CycleOutcome::Completed(stats) => stats,
            CycleOutcome::Failed { stats, .. } => stats,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed(_))
    }
}

pub struct TimeframePoller<S: BarStore> {
    timeframe: Timeframe,
    symbols: Arc<[String]>,
    provider: Arc<dyn HistoryProvider>,
    store: S,
    phase: Phase,
    consecutive_failures: u32,
}

impl<S: BarStore> TimeframePoller<S> {
    pub fn new(
        timeframe: Timeframe,
        symbols: Arc<[String]>,
        provider: Arc<dyn HistoryProvider>,
        store: S,
    ) -> Self {
        Self {
            timeframe,
            symbols,
            provider,
            store,
            phase: Phase::Sleeping,
            consecutive_failures: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    fn enter(&mut self, phase: Phase) {
        debug!(timeframe = %self.timeframe, "{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Runs cycles forever with a fixed sleep between them.
    pub async fn run(mut self) {
        loop {
            self.run_cycle().await;

            let interval = self.timeframe.cycle_interval();
            debug!(timeframe = %self.timeframe, "Sleeping {}s", interval.as_secs());
            tokio::time::sleep(interval).await;
        }
    }

    /// One full pass over the symbol set. Never returns an error; a failure is
    /// reported through [`CycleOutcome::Failed`]. Ends in [`Phase::Sleeping`]
    /// whichever way the cycle went.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        info!(
            timeframe = %self.timeframe,
            "Loading {} started: {}",
            self.timeframe,
            Utc::now().to_rfc3339()
        );

        let mut stats = CycleStats::default();
        let outcome = match self.cycle(&mut stats).await {
            Ok(()) => {
                self.consecutive_failures = 0;
                CycleOutcome::Completed(stats)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                error!(
                    timeframe = %self.timeframe,
                    consecutive_failures = self.consecutive_failures,
                    "Database or data error for {}: {:#}",
                    self.timeframe,
                    e
                );
                CycleOutcome::Failed {
                    stats,
                    error: format!("{:#}", e),
                }
            }
        };

        info!(
            timeframe = %self.timeframe,
            symbols = stats.symbols,
            empty = stats.empty,
            inserted = stats.rows.inserted,
            duplicates = stats.rows.duplicates,
            failed = stats.rows.failed,
            "Loading {} finished: {}",
            self.timeframe,
            Utc::now().to_rfc3339()
        );

        self.enter(Phase::Sleeping);

        if !outcome.is_completed() {
            warn!(
                timeframe = %self.timeframe,
                "Retrying in {}s",
                self.timeframe.cycle_interval().as_secs()
            );
        }

        outcome
    }

    async fn cycle(&mut self, stats: &mut CycleStats) -> Result<()> {
        self.enter(Phase::Connecting);
        let mut session = self.store.open().await?;

        self.enter(Phase::IteratingSymbols);
        let result = self.store_all(&mut session, stats).await;

        if let Err(e) = session.close().await {
            warn!(timeframe = %self.timeframe, "Failed to close connection: {:#}", e);
        }

        result
    }

    async fn store_all(&self, session: &mut S::Session, stats: &mut CycleStats) -> Result<()> {
        let total = self.symbols.len();

        for (i, symbol) in self.symbols.iter().enumerate() {
            let bars = fetch_bars(self.provider.clone(), symbol, self.timeframe).await;
            stats.symbols += 1;

            if bars.is_empty() {
                stats.empty += 1;
            } else {
                let report = session.store(symbol, self.timeframe, &bars).await?;
                stats.rows.merge(report);
            }

            let done = i + 1;
            if done % PROGRESS_EVERY == 0 || done == total {
                info!(timeframe = %self.timeframe, "Processing {}: {}/{}", self.timeframe, done, total);
            }
        }

        Ok(())
    }
}
