use crate::errors::{ForecastError, ForecastResult};
use crate::state::{PricePoint, PriceSeries};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use smallvec::SmallVec;

/// Largest page Binance returns for /api/v3/klines.
const KLINES_LIMIT: usize = 1000;

const DAILY_INTERVAL: &str = "1d";

/// Upper bound on the sleep between retries.
const MAX_BACKOFF_SECS: u64 = 30;

/// Binance spot REST client for historical daily candles.
///
/// Only the public market-data endpoint is used; no key is needed.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    max_retries: u32,
}

impl BinanceClient {
    pub fn new(base_url: &str, max_retries: u32) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .pool_max_idle_per_host(4)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
        }
    }

    /// Daily closes for `symbol` (e.g. "BTCUSDT") with open time in [start, end].
    ///
    /// Pages through the endpoint 1000 candles at a time. An empty result is an
    /// error, never an empty series.
    pub async fn fetch_daily_closes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ForecastResult<PriceSeries> {
        let end_ms = end.timestamp_millis();
        let mut cursor = start.timestamp_millis();
        if cursor > end_ms {
            return Err(ForecastError::MarketData(format!(
                "{symbol}: start {start} is after end {end}"
            )));
        }

        let mut points: Vec<PricePoint> = Vec::new();
        loop {
            let rows = self.get_klines(symbol, cursor, end_ms).await?;
            let page_len = rows.len();
            let page = parse_klines(rows, end_ms)?;
            let last_open = page.last().map(|p| p.timestamp_ms);
            points.extend(page);

            tracing::debug!(symbol, page_len, total = points.len(), "kline page fetched");

            match last_open {
                Some(t) if page_len == KLINES_LIMIT && t < end_ms => cursor = t + 1,
                _ => break,
            }
        }

        if points.is_empty() {
            return Err(ForecastError::MarketData(format!("no data fetched for {symbol}")));
        }

        PriceSeries::new(points)
    }

    /// One page, retrying transient failures with capped exponential backoff.
    async fn get_klines(&self, symbol: &str, start_ms: i64, end_ms: i64) -> ForecastResult<Vec<RawKline>> {
        let mut attempt: u32 = 0;
        loop {
            match self.get_klines_once(symbol, start_ms, end_ms).await {
                Ok(rows) => return Ok(rows),
                Err(e) if is_transient(&e) && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = backoff_secs(attempt);
                    tracing::warn!(
                        error = %e,
                        symbol,
                        attempt,
                        backoff_secs = backoff,
                        "kline fetch failed, retrying"
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_klines_once(&self, symbol: &str, start_ms: i64, end_ms: i64) -> ForecastResult<Vec<RawKline>> {
        let url = format!("{}/api/v3/klines", self.base_url);

        let mut query: SmallVec<[(&str, String); 5]> = SmallVec::new();
        query.push(("symbol", symbol.to_string()));
        query.push(("interval", DAILY_INTERVAL.to_string()));
        query.push(("startTime", start_ms.to_string()));
        query.push(("endTime", end_ms.to_string()));
        query.push(("limit", KLINES_LIMIT.to_string()));

        // A request that cannot be built fails the same way on every attempt
        let resp = self
            .client
            .get(&url)
            .query(&query[..])
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    ForecastError::Config(format!("cannot build request for {url}: {e}"))
                } else {
                    ForecastError::from(e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(if is_retryable_status(status) {
                ForecastError::Network(format!("HTTP {status}: {body}"))
            } else {
                ForecastError::MarketData(format!("{symbol}: HTTP {status}: {body}"))
            });
        }

        resp.json::<Vec<RawKline>>()
            .await
            .map_err(|e| ForecastError::Parse(format!("klines {symbol}: {e}")))
    }
}

// Binance kline row:
// [
//   1499040000000,      // open time
//   "0.01634790",       // open
//   "0.80000000",       // high
//   "0.01575800",       // low
//   "0.01577100",       // close
//   "148976.11427815",  // volume
//   1499644799999,      // close time
//   "2434.19055334",    // quote asset volume
//   308,                // number of trades
//   "1756.87402397",    // taker buy base asset volume
//   "28.46694368",      // taker buy quote asset volume
//   "0"                 // unused
// ]

#[derive(Debug, serde::Deserialize)]
#[allow(dead_code)]
struct RawKline(i64, String, String, String, String, String, i64, String, i64, String, String, String);

/// Keep (open time, close) for candles opening at or before `end_ms`.
fn parse_klines(rows: Vec<RawKline>, end_ms: i64) -> ForecastResult<Vec<PricePoint>> {
    rows.into_iter()
        .filter(|raw| raw.0 <= end_ms)
        .map(|raw| {
            let close: f64 = raw
                .4
                .parse()
                .map_err(|_| ForecastError::Parse(format!("invalid close {:?} at {}", raw.4, raw.0)))?;
            Ok(PricePoint { timestamp_ms: raw.0, close })
        })
        .collect()
}

#[inline]
fn is_retryable_status(status: StatusCode) -> bool {
    // 418 is Binance's ban after ignoring 429s
    status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 || status.is_server_error()
}

#[inline]
fn is_transient(e: &ForecastError) -> bool {
    matches!(e, ForecastError::Network(_))
}

#[inline]
fn backoff_secs(attempt: u32) -> u64 {
    2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS)
}
