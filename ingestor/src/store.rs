//! Bar persistence
//!
//! A [`BarStore`] hands out one [`BarSession`] per cycle. Each `store` call
//! writes one symbol's batch in its own transaction with conflict-free inserts,
//! so re-fetching an overlapping window never duplicates or overwrites rows.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{Bar, Timeframe};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a single bar could not be turned into a row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("volume {0} does not fit in BIGINT")]
    VolumeOutOfRange(u64),
}

/// Normalized row as written to a bar table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRow {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}

impl BarRow {
    pub fn new(symbol: &str, bar: &Bar) -> Result<Self, RowError> {
        let volume = i64::try_from(bar.volume).map_err(|_| RowError::VolumeOutOfRange(bar.volume))?;

        Ok(Self {
            symbol: symbol.to_string(),
            timestamp: bar.timestamp.to_utc(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume,
        })
    }
}

/// Row counts for one stored batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreReport {
    pub inserted: usize,
    /// Rows already present; the insert was a no-op.
    pub duplicates: usize,
    pub failed: usize,
}

impl StoreReport {
    pub fn merge(&mut self, other: StoreReport) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
    }
}

#[async_trait]
pub trait BarStore: Send + Sync {
    type Session: BarSession;

    /// Opens the connection used for one cycle.
    async fn open(&self) -> Result<Self::Session>;
}

#[async_trait]
pub trait BarSession: Send {
    /// Inserts one symbol's bars and commits them together. Row-level failures
    /// are logged and counted in the report; only session-level failures
    /// (lost connection, failed commit) are returned as errors.
    async fn store(&mut self, symbol: &str, timeframe: Timeframe, bars: &[Bar]) -> Result<StoreReport>;

    async fn close(self) -> Result<()>;
}

pub struct PgBarStore {
    options: PgConnectOptions,
}

impl PgBarStore {
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl BarStore for PgBarStore {
    type Session = PgBarSession;

    async fn open(&self) -> Result<Self::Session> {
        let conn = shared::connect(&self.options)
            .await
            .context("failed to open database connection")?;
        Ok(PgBarSession { conn })
    }
}

pub struct PgBarSession {
    conn: PgConnection,
}

fn insert_sql(timeframe: Timeframe) -> String {
    format!(
        r#"
        INSERT INTO {} (symbol, timestamp, open, high, low, close, volume)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT DO NOTHING
        "#,
        timeframe.qualified_table()
    )
}

#[async_trait]
impl BarSession for PgBarSession {
    async fn store(&mut self, symbol: &str, timeframe: Timeframe, bars: &[Bar]) -> Result<StoreReport> {
        let sql = insert_sql(timeframe);
        let mut report = StoreReport::default();

        let mut tx = self.conn.begin().await?;

        for bar in bars {
            let row = match BarRow::new(symbol, bar) {
                Ok(row) => row,
                Err(e) => {
                    warn!(timeframe = %timeframe, symbol, timestamp = %bar.timestamp, "Skipping bar: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            // a failed statement poisons the whole transaction, so each row
            // gets its own savepoint
            let mut savepoint = Connection::begin(&mut *tx).await?;

            let result = sqlx::query(&sql)
                .bind(&row.symbol)
                .bind(row.timestamp)
                .bind(row.open)
                .bind(row.high)
                .bind(row.low)
                .bind(row.close)
                .bind(row.volume)
                .execute(&mut *savepoint)
                .await;

            match result {
                Ok(done) => {
                    savepoint.commit().await?;
                    if done.rows_affected() == 0 {
                        report.duplicates += 1;
                    } else {
                        report.inserted += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        timeframe = %timeframe,
                        symbol,
                        timestamp = %row.timestamp.to_rfc3339(),
                        "INSERT failed: {}",
                        e
                    );
                    savepoint.rollback().await?;
                    report.failed += 1;
                }
            }
        }

        tx.commit().await?;

        debug!(
            timeframe = %timeframe,
            symbol,
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed = report.failed,
            "Stored batch"
        );

        Ok(report)
    }

    async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}
