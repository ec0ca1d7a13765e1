//! Data acquisition: provider, universe, chunking and CSV output

pub mod chunk;
pub mod circuit_breaker;
pub mod download;
pub mod http;
pub mod interval;
pub mod provider;
pub mod store;
pub mod universe;
pub mod yahoo;

pub use chunk::{chunk_range, lookback_window, DateChunk};
pub use circuit_breaker::CircuitBreaker;
pub use download::{DownloadPlan, DownloadSummary, Downloader, Pacer, ThreadSleep, TickerSummary};
pub use interval::Interval;
pub use provider::{
    ChunkOutcome, DataError, DataProvider, DataSource, DownloadProgress, FetchResult, LogProgress,
    MinuteBar,
};
pub use store::{CsvStore, FileSummary};
pub use universe::{scrape_sp500, Universe};
pub use yahoo::{YahooOptions, YahooProvider};
