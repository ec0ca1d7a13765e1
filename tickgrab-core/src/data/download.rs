//! Download orchestrator: walks every ticker through every chunk of the window.
//!
//! For each ticker and each chunk: fetch, append non-empty results to the
//! ticker's CSV, then pause before the next provider call. A failed or empty
//! chunk is reported and skipped; nothing in the loop aborts the run.

use super::chunk::{chunk_range, lookback_window, DateChunk};
use super::interval::Interval;
use super::provider::{ChunkOutcome, DataError, DataProvider, DownloadProgress};
use super::store::CsvStore;
use chrono::{DateTime, Duration, Utc};

/// What to download: interval, window length, chunk size and pacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadPlan {
    pub interval: Interval,
    pub lookback: Duration,
    pub chunk_len: Duration,
    pub delay: std::time::Duration,
}

impl Default for DownloadPlan {
    fn default() -> Self {
        Self {
            interval: Interval::OneMinute,
            lookback: Duration::days(30),
            chunk_len: Duration::days(5),
            delay: std::time::Duration::from_secs(2),
        }
    }
}

impl DownloadPlan {
    /// Chunks of the lookback window ending at `now`.
    pub fn chunks(&self, now: DateTime<Utc>) -> Result<Vec<DateChunk>, DataError> {
        let (start, end) = lookback_window(now, self.lookback)?;
        chunk_range(start, end, self.chunk_len)
    }
}

/// Waits between provider calls.
pub trait Pacer {
    fn pause(&self, delay: std::time::Duration);
}

/// Blocks the current thread.
pub struct ThreadSleep;

impl Pacer for ThreadSleep {
    fn pause(&self, delay: std::time::Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// Per-ticker counters.
#[derive(Debug)]
pub struct TickerSummary {
    pub symbol: String,
    pub chunks: usize,
    pub saved: usize,
    pub empty: usize,
    pub failed: usize,
    pub rows: usize,
    pub errors: Vec<(DateChunk, DataError)>,
}

impl TickerSummary {
    fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            chunks: 0,
            saved: 0,
            empty: 0,
            failed: 0,
            rows: 0,
            errors: Vec::new(),
        }
    }
}

/// Summary of a batch download operation.
#[derive(Debug)]
pub struct DownloadSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tickers: Vec<TickerSummary>,
}

impl DownloadSummary {
    pub fn rows_written(&self) -> usize {
        self.tickers.iter().map(|t| t.rows).sum()
    }

    pub fn chunks_failed(&self) -> usize {
        self.tickers.iter().map(|t| t.failed).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.chunks_failed() == 0
    }

    /// Tickers for which no chunk produced any rows.
    pub fn tickers_without_data(&self) -> Vec<&str> {
        self.tickers
            .iter()
            .filter(|t| t.rows == 0)
            .map(|t| t.symbol.as_str())
            .collect()
    }
}

/// Sequential chunked downloader.
pub struct Downloader<'a> {
    provider: &'a dyn DataProvider,
    store: &'a CsvStore,
    progress: &'a dyn DownloadProgress,
    pacer: &'a dyn Pacer,
    plan: DownloadPlan,
}

impl<'a> Downloader<'a> {
    pub fn new(
        provider: &'a dyn DataProvider,
        store: &'a CsvStore,
        progress: &'a dyn DownloadProgress,
        pacer: &'a dyn Pacer,
        plan: DownloadPlan,
    ) -> Self {
        Self {
            provider,
            store,
            progress,
            pacer,
            plan,
        }
    }

    /// Download every chunk of the window ending at `now` for each ticker.
    ///
    /// Only an invalid plan fails; per-chunk errors land in the summary.
    pub fn run(&self, tickers: &[&str], now: DateTime<Utc>) -> Result<DownloadSummary, DataError> {
        let chunks = self.plan.chunks(now)?;
        let (start, end) = lookback_window(now, self.plan.lookback)?;
        let total = tickers.len();

        tracing::info!(
            provider = self.provider.name(),
            interval = %self.plan.interval,
            chunks = chunks.len(),
            "downloading {start} to {end}"
        );
        self.progress.on_batch_start(total);

        let mut summaries = Vec::with_capacity(total);
        let mut calls = 0usize;

        for (i, symbol) in tickers.iter().enumerate() {
            self.progress.on_symbol_start(symbol, i, total);
            let mut summary = TickerSummary::new(symbol);

            for chunk in &chunks {
                if calls > 0 {
                    self.pacer.pause(self.plan.delay);
                }
                calls += 1;
                summary.chunks += 1;

                match self.download_chunk(symbol, chunk) {
                    Ok(0) => {
                        summary.empty += 1;
                        self.progress.on_chunk(symbol, chunk, ChunkOutcome::Empty);
                    }
                    Ok(rows) => {
                        summary.saved += 1;
                        summary.rows += rows;
                        self.progress
                            .on_chunk(symbol, chunk, ChunkOutcome::Saved { rows });
                    }
                    Err(e) => {
                        summary.failed += 1;
                        self.progress
                            .on_chunk(symbol, chunk, ChunkOutcome::Failed(&e));
                        summary.errors.push((*chunk, e));
                    }
                }
            }

            self.progress.on_symbol_complete(symbol, i, total);
            summaries.push(summary);
        }

        let summary = DownloadSummary {
            start,
            end,
            tickers: summaries,
        };
        self.progress.on_batch_complete(&summary);
        Ok(summary)
    }

    /// Fetch one chunk and append it; returns the rows written.
    fn download_chunk(&self, symbol: &str, chunk: &DateChunk) -> Result<usize, DataError> {
        let fetched = self.provider.fetch(symbol, chunk, self.plan.interval)?;
        if fetched.is_empty() {
            return Ok(0);
        }
        self.store.append(symbol, &fetched.bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_plan_is_thirty_days_of_minutes_in_five_day_chunks() {
        let plan = DownloadPlan::default();
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 16, 0, 0).unwrap();
        let chunks = plan.chunks(now).unwrap();
        assert_eq!(plan.interval, Interval::OneMinute);
        assert_eq!(plan.delay, std::time::Duration::from_secs(2));
        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks.last().unwrap().end, now);
    }

    #[test]
    fn summary_counters() {
        let chunk = DateChunk {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        };
        let mut a = TickerSummary::new("A");
        a.rows = 10;
        let mut b = TickerSummary::new("B");
        b.failed = 1;
        b.errors.push((chunk, DataError::CircuitBreakerTripped));
        let summary = DownloadSummary {
            start: chunk.start,
            end: chunk.end,
            tickers: vec![a, b],
        };
        assert_eq!(summary.rows_written(), 10);
        assert_eq!(summary.chunks_failed(), 1);
        assert!(!summary.all_succeeded());
        assert_eq!(summary.tickers_without_data(), vec!["B"]);
    }
}
