//! In-memory doubles for the provider and store seams.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ingestor::store::{BarRow, BarSession, BarStore, StoreReport};
use ingestor::{HistoryProvider, ProviderError};
use rust_decimal::Decimal;
use shared::{Bar, Timeframe};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 14, 30, 0).unwrap()
}

pub fn bar(symbol: &str, at: DateTime<Utc>, volume: u64) -> Bar {
    Bar::new(
        symbol,
        at,
        Decimal::new(10000, 2),
        Decimal::new(10200, 2),
        Decimal::new(9900, 2),
        Decimal::new(10100, 2),
        volume,
    )
}

/// Serves canned bars; symbols without an entry fail like an unknown ticker.
#[derive(Default)]
pub struct StubProvider {
    responses: HashMap<String, Vec<Bar>>,
    calls: Mutex<Vec<(String, Timeframe)>>,
}

impl StubProvider {
    pub fn with(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.responses.insert(symbol.to_string(), bars);
        self
    }

    pub fn calls(&self) -> Vec<(String, Timeframe)> {
        self.calls.lock().unwrap().clone()
    }
}

impl HistoryProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn history(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, ProviderError> {
        self.calls.lock().unwrap().push((symbol.to_string(), timeframe));
        self.responses
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProviderError::SymbolNotFound(symbol.to_string()))
    }
}

type RowKey = (&'static str, String, DateTime<Utc>);

#[derive(Default)]
struct MemoryState {
    rows: BTreeMap<RowKey, BarRow>,
    opened: usize,
    closed: usize,
    fail_open: bool,
}

/// Keeps committed rows per table with the same conflict-free semantics as
/// the bar tables: a second insert of (symbol, timestamp) is ignored.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    pub fn rows(&self, timeframe: Timeframe, symbol: &str) -> Vec<BarRow> {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|((table, sym, _), _)| *table == timeframe.table() && sym == symbol)
            .map(|(_, row)| row.clone())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl BarStore for MemoryStore {
    type Session = MemorySession;

    async fn open(&self) -> Result<Self::Session> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            bail!("connection refused");
        }
        state.opened += 1;
        Ok(MemorySession {
            state: self.state.clone(),
        })
    }
}

pub struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl BarSession for MemorySession {
    async fn store(&mut self, symbol: &str, timeframe: Timeframe, bars: &[Bar]) -> Result<StoreReport> {
        let mut report = StoreReport::default();
        let mut state = self.state.lock().unwrap();

        for bar in bars {
            let row = match BarRow::new(symbol, bar) {
                Ok(row) => row,
                Err(_) => {
                    report.failed += 1;
                    continue;
                }
            };

            let key = (timeframe.table(), row.symbol.clone(), row.timestamp);
            if state.rows.contains_key(&key) {
                report.duplicates += 1;
            } else {
                state.rows.insert(key, row);
                report.inserted += 1;
            }
        }

        Ok(report)
    }

    async fn close(self) -> Result<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}
