//! Integration tests for the sequential download loop.
//!
//! A scripted provider stands in for Yahoo so the tests can decide, per
//! symbol and chunk, whether a request fails, comes back empty, or returns
//! rows.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::cell::RefCell;
use std::sync::Mutex;
use tickgrab_core::data::{
    CsvStore, DataError, DataProvider, DataSource, DateChunk, DownloadPlan, Downloader,
    FetchResult, Interval, LogProgress, MinuteBar, Pacer,
};

type Script = Box<dyn Fn(&str, usize) -> Result<usize, DataError> + Send + Sync>;

/// Returns `script(symbol, call_index_for_symbol)` bars per chunk.
struct ScriptedProvider {
    script: Script,
    calls: Mutex<Vec<(String, DateChunk)>>,
}

impl ScriptedProvider {
    fn new(script: impl Fn(&str, usize) -> Result<usize, DataError> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, DateChunk)> {
        self.calls.lock().unwrap().clone()
    }
}

impl DataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch(
        &self,
        symbol: &str,
        chunk: &DateChunk,
        _interval: Interval,
    ) -> Result<FetchResult, DataError> {
        let mut calls = self.calls.lock().unwrap();
        let nth = calls.iter().filter(|(s, _)| s == symbol).count();
        calls.push((symbol.to_string(), *chunk));
        drop(calls);

        let count = (self.script)(symbol, nth)?;
        let utc = FixedOffset::east_opt(0).unwrap();
        let bars = (0..count)
            .map(|i| MinuteBar {
                timestamp: (chunk.start + chrono::Duration::minutes(i as i64)).with_timezone(&utc),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.5,
                volume: 100,
            })
            .collect();

        Ok(FetchResult {
            symbol: symbol.to_string(),
            chunk: *chunk,
            bars,
            source: DataSource::Synthetic,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct RecordingPacer {
    pauses: RefCell<Vec<std::time::Duration>>,
}

impl Pacer for RecordingPacer {
    fn pause(&self, delay: std::time::Duration) {
        self.pauses.borrow_mut().push(delay);
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 28, 20, 0, 0).unwrap()
}

fn run(provider: &ScriptedProvider, store: &CsvStore, pacer: &RecordingPacer, tickers: &[&str]) {
    let downloader = Downloader::new(provider, store, &LogProgress, pacer, DownloadPlan::default());
    downloader.run(tickers, now()).unwrap();
}

#[test]
fn failed_and_empty_chunks_write_nothing_and_loop_continues() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvStore::new(dir.path());
    let pacer = RecordingPacer::default();
    let provider = ScriptedProvider::new(|symbol, _| match symbol {
        "FAIL" => Err(DataError::NetworkUnreachable("connection reset".into())),
        "EMPTY" => Ok(0),
        _ => Ok(2),
    });

    let downloader = Downloader::new(&provider, &store, &LogProgress, &pacer, DownloadPlan::default());
    let summary = downloader.run(&["FAIL", "EMPTY", "GOOD"], now()).unwrap();

    // Every chunk of every ticker was attempted, in order.
    let calls = provider.calls();
    assert_eq!(calls.len(), 18);
    assert_eq!(calls[0].0, "FAIL");
    assert_eq!(calls[17].0, "GOOD");

    assert!(!store.path_for("FAIL").unwrap().exists());
    assert!(!store.path_for("EMPTY").unwrap().exists());

    let good = store.summarize("GOOD").unwrap();
    assert_eq!(good.rows, 12);

    assert_eq!(summary.tickers[0].failed, 6);
    assert_eq!(summary.tickers[0].errors.len(), 6);
    assert_eq!(summary.tickers[1].empty, 6);
    assert_eq!(summary.tickers[2].saved, 6);
    assert_eq!(summary.rows_written(), 12);
    assert_eq!(summary.tickers_without_data(), vec!["FAIL", "EMPTY"]);
}

#[test]
fn a_single_failed_chunk_only_skips_that_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvStore::new(dir.path());
    let pacer = RecordingPacer::default();
    let provider = ScriptedProvider::new(|_, nth| {
        if nth == 2 {
            Err(DataError::ProviderRejected {
                status: 422,
                message: "Unprocessable Entity".into(),
            })
        } else {
            Ok(1)
        }
    });

    run(&provider, &store, &pacer, &["AAPL"]);

    assert_eq!(store.summarize("AAPL").unwrap().rows, 5);
}

#[test]
fn repeated_runs_append_rather_than_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("stock_data"));
    let pacer = RecordingPacer::default();
    let provider = ScriptedProvider::new(|_, _| Ok(3));

    run(&provider, &store, &pacer, &["MSFT"]);
    let first = std::fs::read_to_string(store.path_for("MSFT").unwrap()).unwrap();

    run(&provider, &store, &pacer, &["MSFT"]);
    let second = std::fs::read_to_string(store.path_for("MSFT").unwrap()).unwrap();

    assert!(second.starts_with(&first));
    assert_eq!(second.matches("Datetime").count(), 1);
    assert_eq!(store.summarize("MSFT").unwrap().rows, 36);
}

#[test]
fn pauses_between_consecutive_requests() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvStore::new(dir.path());
    let pacer = RecordingPacer::default();
    let provider = ScriptedProvider::new(|_, _| Ok(0));

    run(&provider, &store, &pacer, &["A", "B"]);

    let pauses = pacer.pauses.borrow();
    assert_eq!(pauses.len(), 11);
    assert!(pauses.iter().all(|d| *d == std::time::Duration::from_secs(2)));
}

#[test]
fn chunks_requested_cover_the_lookback_window() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvStore::new(dir.path());
    let pacer = RecordingPacer::default();
    let provider = ScriptedProvider::new(|_, _| Ok(0));

    run(&provider, &store, &pacer, &["SPY"]);

    let chunks: Vec<DateChunk> = provider.calls().into_iter().map(|(_, c)| c).collect();
    assert_eq!(chunks.first().unwrap().start, now() - chrono::Duration::days(30));
    assert_eq!(chunks.last().unwrap().end, now());
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
}

#[test]
fn empty_ticker_list_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("out"));
    let pacer = RecordingPacer::default();
    let provider = ScriptedProvider::new(|_, _| Ok(1));

    let downloader = Downloader::new(&provider, &store, &LogProgress, &pacer, DownloadPlan::default());
    let summary = downloader.run(&[], now()).unwrap();

    assert!(summary.tickers.is_empty());
    assert!(provider.calls().is_empty());
    assert!(!dir.path().join("out").exists());
}
