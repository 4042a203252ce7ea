use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;

/// Database schema holding the bar tables.
pub const SCHEMA: &str = "sp_500_2";

/// Sampling configuration polled by one loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Daily,
    Hourly,
    FiveMinute,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Daily, Timeframe::Hourly, Timeframe::FiveMinute];

    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Daily => "daily",
            Timeframe::Hourly => "hourly",
            Timeframe::FiveMinute => "5min",
        }
    }

    /// How far back each fetch reaches, in the provider's range notation.
    pub fn window(&self) -> &'static str {
        match self {
            Timeframe::Daily => "2y",
            Timeframe::Hourly => "20d",
            Timeframe::FiveMinute => "2d",
        }
    }

    /// Bar granularity, in the provider's interval notation.
    pub fn granularity(&self) -> &'static str {
        match self {
            Timeframe::Daily => "1d",
            Timeframe::Hourly => "1h",
            Timeframe::FiveMinute => "5m",
        }
    }

    /// Time covered by one bar.
    pub fn bar_length(&self) -> Duration {
        match self {
            Timeframe::Daily => Duration::from_secs(86_400),
            Timeframe::Hourly => Duration::from_secs(3_600),
            Timeframe::FiveMinute => Duration::from_secs(300),
        }
    }

    /// Fixed pause between two cycles of this timeframe's loop.
    pub fn cycle_interval(&self) -> Duration {
        match self {
            Timeframe::Daily => Duration::from_secs(86_400),
            Timeframe::Hourly => Duration::from_secs(3_600),
            Timeframe::FiveMinute => Duration::from_secs(300),
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Timeframe::Daily => "sp500_daily",
            Timeframe::Hourly => "sp500_hourly",
            Timeframe::FiveMinute => "sp500_minute",
        }
    }

    /// Schema-qualified table name.
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", SCHEMA, self.table())
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bar timestamp as reported by a provider, with or without an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarTime {
    /// No timezone information; taken as UTC.
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl BarTime {
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            BarTime::Naive(naive) => naive.and_utc(),
            BarTime::Zoned(zoned) => zoned.with_timezone(&Utc),
        }
    }
}

impl From<DateTime<Utc>> for BarTime {
    fn from(value: DateTime<Utc>) -> Self {
        BarTime::Zoned(value.fixed_offset())
    }
}

impl fmt::Display for BarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarTime::Naive(naive) => write!(f, "{}", naive),
            BarTime::Zoned(zoned) => write!(f, "{}", zoned.to_rfc3339()),
        }
    }
}

/// OHLCV bar
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// Provider symbol (e.g., "BRK-B")
    pub symbol: String,
    pub timestamp: BarTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        symbol: impl Into<String>,
        timestamp: impl Into<BarTime>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: u64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp: timestamp.into(),
            open,
            high,
            low,
            close,
            volume,
        }
    }
}
