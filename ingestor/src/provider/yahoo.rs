//! Yahoo Finance data provider.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API using a `range`/`interval`
//! pair taken from the timeframe. The API is unauthenticated and undocumented,
//! so the response is parsed defensively: gaps and null rows are skipped.
//!
//! While a session is open the last bar carries the latest trade time rather
//! than its start. Every timestamp is therefore rounded down to the start of
//! its bar so a live bar and its settled version share one key.
//!
//! The client is `reqwest::blocking`; build it and call it off the async
//! scheduler (see [`crate::fetcher`]).

use super::{HistoryProvider, ProviderError};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{Bar, BarTime, Timeframe};
use std::time::Duration;
use tracing::debug;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    exchange_timezone_name: Option<String>,
    gmtoffset: Option<i32>,
    current_trading_period: Option<TradingPeriods>,
}

#[derive(Debug, Deserialize)]
struct TradingPeriods {
    regular: Option<TradingPeriod>,
}

#[derive(Debug, Deserialize)]
struct TradingPeriod {
    start: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Exchange clock used to label bar timestamps.
#[derive(Debug, Clone, Copy)]
enum ExchangeZone {
    Named(Tz),
    Offset(FixedOffset),
}

impl ExchangeZone {
    fn from_meta(meta: Option<&ChartMeta>) -> Self {
        let named = meta
            .and_then(|m| m.exchange_timezone_name.as_deref())
            .and_then(|name| name.parse::<Tz>().ok());
        if let Some(tz) = named {
            return ExchangeZone::Named(tz);
        }

        let offset = meta
            .and_then(|m| m.gmtoffset)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        ExchangeZone::Offset(offset)
    }

    fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            ExchangeZone::Named(tz) => instant.with_timezone(tz).fixed_offset(),
            ExchangeZone::Offset(offset) => instant.with_timezone(offset),
        }
    }

    fn midnight(&self, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
        let start = date.and_hms_opt(0, 0, 0)?;
        match self {
            ExchangeZone::Named(tz) => tz.from_local_datetime(&start).earliest().map(|t| t.fixed_offset()),
            ExchangeZone::Offset(offset) => offset.from_local_datetime(&start).single(),
        }
    }
}

/// Maps raw Yahoo timestamps onto bar start times.
#[derive(Debug, Clone, Copy)]
struct BarClock {
    zone: ExchangeZone,
    timeframe: Timeframe,
    /// Any instant on the intraday bar grid, normally a session open.
    anchor: i64,
}

impl BarClock {
    /// Daily bars start at exchange midnight of their session date. Intraday
    /// bars start on a multiple of the bar length counted from the anchor.
    fn bar_start(&self, ts: i64) -> Result<DateTime<FixedOffset>, ProviderError> {
        let invalid = || ProviderError::Parse(format!("invalid timestamp: {ts}"));

        match self.timeframe {
            Timeframe::Daily => {
                let instant = DateTime::from_timestamp(ts, 0).ok_or_else(invalid)?;
                let session = self.zone.localize(instant).date_naive();
                self.zone.midnight(session).ok_or_else(invalid)
            }
            Timeframe::Hourly | Timeframe::FiveMinute => {
                let step = self.timeframe.bar_length().as_secs() as i64;
                let start = self.anchor + (ts - self.anchor).div_euclid(step) * step;
                let instant = DateTime::from_timestamp(start, 0).ok_or_else(invalid)?;
                Ok(self.zone.localize(instant))
            }
        }
    }
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build the chart API URL for a symbol and timeframe.
    fn chart_url(base_url: &str, symbol: &str, timeframe: Timeframe) -> String {
        format!(
            "{base_url}/v8/finance/chart/{symbol}\
             ?range={}&interval={}&includePrePost=false",
            timeframe.window(),
            timeframe.granularity()
        )
    }

    /// Parse the chart API response into bars keyed by bar start.
    fn parse_response(
        symbol: &str,
        timeframe: Timeframe,
        resp: ChartResponse,
    ) -> Result<Vec<Bar>, ProviderError> {
        if let Some(err) = resp.chart.error {
            return Err(chart_error(symbol, err));
        }

        let data = match resp.chart.result.and_then(|r| r.into_iter().next()) {
            Some(data) => data,
            None => return Ok(Vec::new()),
        };

        // Yahoo omits timestamps entirely for an empty window
        let timestamps = match data.timestamp {
            Some(ts) => ts,
            None => return Ok(Vec::new()),
        };

        let zone = ExchangeZone::from_meta(data.meta.as_ref());
        let session_open = data
            .meta
            .as_ref()
            .and_then(|m| m.current_trading_period.as_ref())
            .and_then(|p| p.regular.as_ref())
            .map(|r| r.start);
        let clock = BarClock {
            zone,
            timeframe,
            // the window starts at a session open too
            anchor: session_open.or_else(|| timestamps.first().copied()).unwrap_or(0),
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("no quote data".into()))?;

        let mut bars: Vec<Bar> = Vec::with_capacity(timestamps.len());
        let mut skipped = 0usize;

        for (i, &ts) in timestamps.iter().enumerate() {
            let start = clock.bar_start(ts)?;

            let prices = (
                price_at(&quote.open, i),
                price_at(&quote.high, i),
                price_at(&quote.low, i),
                price_at(&quote.close, i),
            );

            let (open, high, low, close) = match prices {
                (Some(open), Some(high), Some(low), Some(close)) => (open, high, low, close),
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            // a live row can land in the slot of the bar before it
            if bars.last().is_some_and(|prev| prev.timestamp == BarTime::Zoned(start)) {
                skipped += 1;
                continue;
            }

            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp: BarTime::Zoned(start),
                open,
                high,
                low,
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            });
        }

        if skipped > 0 {
            debug!(symbol, skipped, "Skipped incomplete or repeated rows");
        }

        Ok(bars)
    }
}

fn chart_error(symbol: &str, err: ChartError) -> ProviderError {
    if err.code == "Not Found" {
        ProviderError::SymbolNotFound(symbol.to_string())
    } else {
        ProviderError::Provider(format!("{}: {}", err.code, err.description))
    }
}

fn price_at(series: &[Option<f64>], i: usize) -> Option<Decimal> {
    series
        .get(i)
        .copied()
        .flatten()
        .filter(|v| v.is_finite())
        .and_then(Decimal::from_f64)
}

impl HistoryProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn history(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, ProviderError> {
        let url = Self::chart_url(&self.base_url, symbol, timeframe);

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !status.is_success() {
            // unknown symbols come back as 404 with a chart error body
            if let Ok(chart) = serde_json::from_str::<ChartResponse>(&body) {
                if let Some(err) = chart.chart.error {
                    return Err(chart_error(symbol, err));
                }
            }
            return Err(ProviderError::Http(status.as_u16()));
        }

        let chart: ChartResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::Parse(format!("failed to parse response for {symbol}: {e}"))
        })?;

        Self::parse_response(symbol, timeframe, chart)
    }
}
