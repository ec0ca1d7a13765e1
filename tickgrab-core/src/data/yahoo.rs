//! Yahoo Finance data provider.
//!
//! Fetches intraday OHLCV bars from Yahoo's v8 chart API, one chunk per
//! request. Handles throttling responses, optional retries with exponential
//! backoff, response parsing, and the circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; every shape mismatch surfaces as `ResponseFormatChanged`.

use super::chunk::DateChunk;
use super::circuit_breaker::CircuitBreaker;
use super::http::{build_client, DEFAULT_USER_AGENT};
use super::interval::Interval;
use super::provider::{DataError, DataProvider, DataSource, FetchResult, MinuteBar};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    result: Option<Vec<ChartData>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

impl ChartError {
    fn message(&self) -> String {
        match &self.description {
            Some(description) => format!("{}: {description}", self.code),
            None => self.code.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default, rename = "gmtoffset")]
    gmt_offset: i32,
    #[serde(default)]
    exchange_timezone_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

// Yahoo answers empty ranges with `"quote": [{}]`, so every column defaults.
#[derive(Debug, Default, Deserialize)]
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

/// Connection and retry settings for [`YahooProvider`].
#[derive(Debug, Clone)]
pub struct YahooOptions {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Extra attempts after the first one; zero disables retrying.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for YahooOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 0,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(options: YahooOptions, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = build_client(&options.user_agent, options.timeout)?;
        Ok(Self {
            client,
            circuit_breaker,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            max_retries: options.max_retries,
            base_delay: options.retry_base_delay,
        })
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!("{}/v8/finance/chart/{symbol}", self.base_url)
    }

    fn query_params(chunk: &DateChunk, interval: Interval) -> [(&'static str, String); 4] {
        [
            ("period1", chunk.start.timestamp().to_string()),
            ("period2", chunk.end.timestamp().to_string()),
            ("interval", interval.as_str().to_string()),
            ("includePrePost", "false".to_string()),
        ]
    }

    /// Parse the chart API response into bars inside `chunk`.
    ///
    /// A result without timestamps is an empty range, not an error.
    fn parse_response(
        symbol: &str,
        chunk: &DateChunk,
        resp: ChartResponse,
    ) -> Result<Vec<MinuteBar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => DataError::ResponseFormatChanged(err.message()),
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let offset = data
            .meta
            .as_ref()
            .and_then(|m| FixedOffset::east_opt(m.gmt_offset))
            .unwrap_or_else(|| Utc.fix());
        if let Some(tz) = data.meta.as_ref().and_then(|m| m.exchange_timezone_name.as_deref()) {
            tracing::debug!(symbol, tz, %offset, "exchange timezone");
        }

        let timestamps = match data.timestamp {
            Some(ts) if !ts.is_empty() => ts,
            _ => return Ok(Vec::new()),
        };

        let quote = data
            .indicators
            .and_then(|i| i.quote.into_iter().next())
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let utc = DateTime::<Utc>::from_timestamp(ts, 0).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;

            // Yahoo may echo the bar at period2; keep chunks disjoint.
            if utc < chunk.start || utc >= chunk.end {
                continue;
            }

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Halted or untraded minutes come back with null prices.
            let (Some(open), Some(high), Some(low), Some(close)) = (open, high, low, close) else {
                continue;
            };

            bars.push(MinuteBar {
                timestamp: utc.with_timezone(&offset),
                open,
                high,
                low,
                close,
                volume: volume.unwrap_or(0),
            });
        }

        Ok(bars)
    }

    /// Pull the provider's own error message out of a non-success body, if any.
    fn error_message(body: &str) -> Option<String> {
        serde_json::from_str::<ChartResponse>(body)
            .ok()
            .and_then(|r| r.chart.error)
            .map(|e| e.message())
    }

    /// Execute the chart request with retry and circuit breaker logic.
    fn fetch_with_retry(
        &self,
        symbol: &str,
        chunk: &DateChunk,
        interval: Interval,
    ) -> Result<Vec<MinuteBar>, DataError> {
        let url = self.chart_url(symbol);
        let params = Self::query_params(chunk, interval);
        let mut last_error = None;
        let mut retry_after: Option<Duration> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = retry_delay(self.base_delay, attempt, retry_after.take());
                tracing::debug!(symbol, attempt, ?delay, "retrying chart request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                tracing::debug!(
                    symbol,
                    remaining = ?self.circuit_breaker.remaining_cooldown(),
                    "circuit breaker open, skipping request"
                );
                return Err(DataError::CircuitBreakerTripped);
            }

            tracing::debug!(symbol, %url, %chunk, %interval, "requesting chart");

            match self.client.get(&url).query(&params).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let header_secs = resp
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.trim().parse::<u64>().ok());
                        retry_after = header_secs.map(Duration::from_secs);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: header_secs.unwrap_or(60),
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }

                    if status.is_server_error() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    if !status.is_success() {
                        // e.g. 422 when the chunk is older than the interval's lookback
                        let body = resp.text().unwrap_or_default();
                        let message = Self::error_message(&body)
                            .unwrap_or_else(|| format!("HTTP {status} for {symbol}"));
                        return Err(DataError::ProviderRejected {
                            status: status.as_u16(),
                            message,
                        });
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    let bars = Self::parse_response(symbol, chunk, chart)?;
                    self.circuit_breaker.record_success();
                    return Ok(bars);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

/// Exponential backoff from `base`, stretched to the provider's `Retry-After` when longer.
fn retry_delay(base: Duration, attempt: u32, retry_after: Option<Duration>) -> Duration {
    let backoff = base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    retry_after.map_or(backoff, |wait| wait.max(backoff))
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        chunk: &DateChunk,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        let bars = self.fetch_with_retry(symbol, chunk, interval)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            chunk: *chunk,
            bars,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
