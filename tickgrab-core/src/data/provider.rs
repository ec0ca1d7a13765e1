//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over the quote source so the download
//! loop can run against Yahoo Finance in production and a scripted provider
//! in tests.

use super::chunk::DateChunk;
use super::interval::Interval;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV bar at the requested sampling interval.
///
/// The timestamp keeps the exchange's UTC offset so the CSV shows
/// exchange-local wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteBar {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Structured error types for data operations.
///
/// These are logged per chunk by the download loop and shown verbatim by the CLI.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("provider rejected request (HTTP {status}): {message}")]
    ProviderRejected { status: u16, message: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("universe unavailable: {0}")]
    UniverseError(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Result of a single chunk request for one symbol.
///
/// `bars` may be empty: weekends, holidays and pre-listing ranges are
/// answered by the provider without rows.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub chunk: DateChunk,
    pub bars: Vec<MinuteBar>,
    pub source: DataSource,
}

impl FetchResult {
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    Synthetic,
}

/// Trait for quote providers.
///
/// Implementations fetch exactly one chunk per call. Pacing between calls
/// and persistence live above this trait.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch bars for a symbol over one half-open chunk `[start, end)`.
    fn fetch(
        &self,
        symbol: &str,
        chunk: &DateChunk,
        interval: Interval,
    ) -> Result<FetchResult, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Outcome of one chunk, as reported to progress observers.
#[derive(Debug)]
pub enum ChunkOutcome<'a> {
    Saved { rows: usize },
    Empty,
    Failed(&'a DataError),
}

/// Progress callback for multi-symbol downloads.
pub trait DownloadProgress: Send {
    /// Called once before the first symbol.
    fn on_batch_start(&self, total: usize);

    /// Called when starting to fetch a symbol.
    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize);

    /// Called after each chunk request.
    fn on_chunk(&self, symbol: &str, chunk: &DateChunk, outcome: ChunkOutcome<'_>);

    /// Called when every chunk of a symbol has been attempted.
    fn on_symbol_complete(&self, symbol: &str, index: usize, total: usize);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, summary: &super::download::DownloadSummary);
}

/// Progress reporter that emits `tracing` events.
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_batch_start(&self, total: usize) {
        tracing::info!(total, "Total tickers to fetch: {total}");
    }

    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize) {
        tracing::info!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_chunk(&self, symbol: &str, chunk: &DateChunk, outcome: ChunkOutcome<'_>) {
        match outcome {
            ChunkOutcome::Saved { rows } => {
                tracing::info!(symbol, rows, "Saved {rows} rows for {symbol} from {chunk}")
            }
            ChunkOutcome::Empty => {
                tracing::info!(symbol, "No data found for {symbol} from {chunk}")
            }
            ChunkOutcome::Failed(e) => {
                tracing::warn!(symbol, error = %e, "Error fetching {symbol} between {chunk}: {e}")
            }
        }
    }

    fn on_symbol_complete(&self, symbol: &str, _index: usize, _total: usize) {
        tracing::info!("Completed fetching data for {symbol}");
    }

    fn on_batch_complete(&self, summary: &super::download::DownloadSummary) {
        tracing::info!(
            tickers = summary.tickers.len(),
            rows = summary.rows_written(),
            failed_chunks = summary.chunks_failed(),
            "Data fetching for all tickers completed."
        );
    }
}
