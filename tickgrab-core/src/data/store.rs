//! Per-ticker CSV output.
//!
//! Layout: `{output_dir}/{SYMBOL}.csv`
//!
//! The first write creates the file with a header row; later writes append
//! rows only. Existing rows are never rewritten, so repeated runs grow the
//! file in fetch order.

use super::provider::{DataError, MinuteBar};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const HEADER: [&str; 6] = ["Datetime", "Open", "High", "Low", "Close", "Volume"];

/// Exchange-local wall-clock time with its UTC offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Append-only CSV store, one file per symbol.
#[derive(Debug, Clone)]
pub struct CsvStore {
    output_dir: PathBuf,
}

/// What a CSV file on disk currently holds.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub symbol: String,
    pub path: PathBuf,
    pub rows: usize,
    pub first: Option<String>,
    pub last: Option<String>,
    pub bytes: u64,
}

impl CsvStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `{output_dir}/{symbol}.csv`
    pub fn path_for(&self, symbol: &str) -> Result<PathBuf, DataError> {
        if symbol.is_empty()
            || symbol == "."
            || symbol == ".."
            || symbol.contains(['/', '\\'])
        {
            return Err(DataError::StorageError(format!(
                "symbol '{symbol}' cannot be used as a file name"
            )));
        }
        Ok(self.output_dir.join(format!("{symbol}.csv")))
    }

    /// Append bars to the symbol's file, writing the header only into a new file.
    ///
    /// Returns the number of rows written. An empty slice touches nothing.
    pub fn append(&self, symbol: &str, bars: &[MinuteBar]) -> Result<usize, DataError> {
        if bars.is_empty() {
            return Ok(0);
        }

        let path = self.path_for(symbol)?;
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            DataError::StorageError(format!(
                "failed to create {}: {e}",
                self.output_dir.display()
            ))
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| DataError::StorageError(format!("open {}: {e}", path.display())))?;
        let is_new = file
            .metadata()
            .map_err(|e| DataError::StorageError(format!("stat {}: {e}", path.display())))?
            .len()
            == 0;

        // Encode up front; the batch reaches the file in a single write.
        let buf = encode_rows(bars, is_new)?;
        file.write_all(&buf)
            .and_then(|()| file.flush())
            .map_err(|e| DataError::StorageError(format!("write {}: {e}", path.display())))?;

        tracing::debug!(symbol, rows = bars.len(), path = %path.display(), new_file = is_new, "appended rows");
        Ok(bars.len())
    }

    /// Row count, first/last timestamp and size of one symbol's file.
    pub fn summarize(&self, symbol: &str) -> Result<FileSummary, DataError> {
        let path = self.path_for(symbol)?;
        let bytes = fs::metadata(&path)
            .map_err(|e| DataError::StorageError(format!("stat {}: {e}", path.display())))?
            .len();

        let mut rdr = csv::Reader::from_path(&path)
            .map_err(|e| DataError::StorageError(format!("read {}: {e}", path.display())))?;

        let mut rows = 0;
        let mut first = None;
        let mut last = None;
        for record in rdr.records() {
            let record =
                record.map_err(|e| DataError::StorageError(format!("read {}: {e}", path.display())))?;
            let ts = record.get(0).map(str::to_string);
            if first.is_none() {
                first = ts.clone();
            }
            last = ts;
            rows += 1;
        }

        Ok(FileSummary {
            symbol: symbol.to_string(),
            path,
            rows,
            first,
            last,
            bytes,
        })
    }

    /// Summaries for every `.csv` file in the output directory, sorted by symbol.
    pub fn list(&self) -> Result<Vec<FileSummary>, DataError> {
        if !self.output_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.output_dir)
            .map_err(|e| DataError::StorageError(format!("read dir: {e}")))?;

        let mut summaries = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::StorageError(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(symbol) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.summarize(symbol) {
                Ok(summary) => summaries.push(summary),
                Err(e) => tracing::warn!(path = %path.display(), "skipping unreadable file: {e}"),
            }
        }
        summaries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(summaries)
    }
}

/// Encode bars as CSV rows, optionally preceded by the header.
fn encode_rows(bars: &[MinuteBar], with_header: bool) -> Result<Vec<u8>, DataError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::with_capacity(bars.len() * 64));
    let csv_err = |e: csv::Error| DataError::StorageError(format!("encode rows: {e}"));

    if with_header {
        wtr.write_record(HEADER).map_err(csv_err)?;
    }
    for bar in bars {
        wtr.write_record([
            bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])
        .map_err(csv_err)?;
    }
    wtr.into_inner()
        .map_err(|e| DataError::StorageError(format!("encode rows: {}", e.error())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn bar(minute: u32, close: f64) -> MinuteBar {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        MinuteBar {
            timestamp: tz.with_ymd_and_hms(2024, 3, 4, 9, 30 + minute, 0).unwrap(),
            open: 100.0,
            high: 101.0,
            low: 99.5,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn first_write_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("stock_data"));
        assert_eq!(store.append("AAPL", &[bar(0, 100.5)]).unwrap(), 1);

        let content = fs::read_to_string(store.path_for("AAPL").unwrap()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Datetime,Open,High,Low,Close,Volume");
        assert_eq!(lines[1], "2024-03-04 09:30:00-05:00,100,101,99.5,100.5,1000");
    }

    #[test]
    fn second_write_appends_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        store.append("MSFT", &[bar(0, 1.0)]).unwrap();
        store.append("MSFT", &[bar(1, 2.0), bar(2, 3.0)]).unwrap();

        let content = fs::read_to_string(store.path_for("MSFT").unwrap()).unwrap();
        assert_eq!(content.matches("Datetime").count(), 1);
        assert_eq!(content.lines().count(), 4);
    }

    #[test]
    fn empty_append_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("out"));
        assert_eq!(store.append("AAPL", &[]).unwrap(), 0);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn rejects_path_like_symbols() {
        let store = CsvStore::new("out");
        assert!(store.path_for("../etc").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("BRK-B").is_ok());
    }

    #[test]
    fn summarize_reports_range() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        store.append("SPY", &[bar(0, 1.0), bar(1, 2.0), bar(2, 3.0)]).unwrap();
        store.append("AAPL", &[bar(5, 1.0)]).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].symbol, "AAPL");
        let spy = &all[1];
        assert_eq!(spy.rows, 3);
        assert_eq!(spy.first.as_deref(), Some("2024-03-04 09:30:00-05:00"));
        assert_eq!(spy.last.as_deref(), Some("2024-03-04 09:32:00-05:00"));
        assert!(spy.bytes > 0);
    }

    #[test]
    fn list_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        store.append("MSFT", &[bar(0, 1.0)]).unwrap();
        fs::write(dir.path().join("RAGGED.csv"), "a,b\n1,2,3\n").unwrap();
        fs::write(dir.path().join("..csv"), "a,b\n1,2\n").unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].symbol, "MSFT");
    }

    #[test]
    fn encoded_batch_is_complete_before_writing() {
        let with_header = encode_rows(&[bar(0, 1.0), bar(1, 2.0)], true).unwrap();
        let text = String::from_utf8(with_header).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("Datetime,"));

        let rows_only = encode_rows(&[bar(0, 1.0)], false).unwrap();
        assert_eq!(
            String::from_utf8(rows_only).unwrap(),
            "2024-03-04 09:30:00-05:00,100,101,99.5,1,1000\n"
        );
    }

    #[test]
    fn list_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("nope"));
        assert!(store.list().unwrap().is_empty());
    }
}
