//! tickgrab core: chunked intraday downloads from Yahoo Finance into per-ticker CSV files.
//!
//! - Universe loading (Wikipedia S&P 500 table, TOML lists, explicit symbols)
//! - Date window partitioning into provider-sized chunks
//! - Yahoo chart provider with circuit breaker
//! - Append-only CSV store
//! - Sequential download loop that logs and skips failed chunks

pub mod config;
pub mod data;

pub use config::{ConfigError, DownloaderConfig, ProviderConfig};

#[cfg(test)]
mod tests {
    use super::*;

    /// The provider is shared behind `&dyn DataProvider`; keep it thread-safe.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::MinuteBar>();
        require_sync::<data::MinuteBar>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<DownloaderConfig>();
        require_sync::<DownloaderConfig>();
    }
}
