//! tickgrab CLI: download, universe and status commands.
//!
//! Commands:
//! - `download` fetches intraday bars for the universe into per-ticker CSV files
//! - `universe` scrapes the S&P 500 constituents and prints or saves them as TOML
//! - `status` reports what the output directory currently holds

mod logging;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tickgrab_core::data::http::build_client;
use tickgrab_core::data::{
    scrape_sp500, CircuitBreaker, CsvStore, Downloader, Interval, LogProgress, ThreadSleep,
    Universe, YahooProvider,
};
use tickgrab_core::DownloaderConfig;

#[derive(Parser)]
#[command(
    name = "tickgrab",
    about = "tickgrab: batch intraday downloader for S&P 500 stocks",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download intraday bars for every ticker and append them to CSV files.
    Download(DownloadArgs),
    /// Scrape the S&P 500 constituents list.
    Universe {
        /// Constituents page. Defaults to the Wikipedia S&P 500 list.
        #[arg(long)]
        url: Option<String>,

        /// Write the universe TOML here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Report rows, time range and size of each CSV file.
    Status {
        /// Output directory. Defaults to the configured one.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct DownloadArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Download only these symbols instead of the S&P 500.
    #[arg(long, num_args = 1..)]
    symbols: Vec<String>,

    /// Universe TOML file (as written by `tickgrab universe --out`).
    #[arg(long, conflicts_with = "symbols")]
    universe_file: Option<PathBuf>,

    /// Restrict the universe to these GICS sectors.
    #[arg(long, num_args = 1..)]
    sector: Vec<String>,

    /// Directory receiving one CSV file per ticker.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Bar interval: 1m, 2m, 5m, 15m, 30m, 60m, 90m, 1h, 1d.
    #[arg(long)]
    interval: Option<Interval>,

    /// Days of history to request, ending now.
    #[arg(long)]
    lookback_days: Option<i64>,

    /// Days per request.
    #[arg(long)]
    chunk_days: Option<i64>,

    /// Pause between requests, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Download(args) => run_download(args),
        Commands::Universe { url, out } => run_universe(url, out),
        Commands::Status { output_dir } => run_status(output_dir),
    }
}

fn load_config(path: Option<&Path>) -> Result<DownloaderConfig> {
    let mut config = match path {
        Some(path) => DownloaderConfig::from_file(path)?,
        None => DownloaderConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("applying TICKGRAB_* environment overrides")?;
    Ok(config)
}

/// Command-line flags win over the file and the environment.
fn apply_args(config: &mut DownloaderConfig, args: &DownloadArgs) {
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(interval) = args.interval {
        config.interval = interval;
    }
    if let Some(days) = args.lookback_days {
        config.lookback_days = days;
    }
    if let Some(days) = args.chunk_days {
        config.chunk_days = days;
    }
    if let Some(ms) = args.delay_ms {
        config.request_delay_ms = ms;
    }
}

fn run_download(args: DownloadArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_args(&mut config, &args);
    config.validate()?;

    let mut universe = if !args.symbols.is_empty() {
        Universe::from_symbols(args.symbols.as_slice())
    } else if let Some(path) = &args.universe_file {
        Universe::from_file(path)?
    } else {
        let client = build_client(&config.provider.user_agent, config.provider.timeout())?;
        scrape_sp500(&client, &config.universe_url)
            .with_context(|| format!("loading ticker list from {}", config.universe_url))?
    };

    if !args.sector.is_empty() {
        let unknown = universe.retain_sectors(args.sector.as_slice());
        for name in &unknown {
            tracing::warn!("unknown sector '{name}'");
        }
        if universe.is_empty() {
            bail!("no tickers left after filtering to sectors {:?}", args.sector);
        }
    }

    let breaker = Arc::new(CircuitBreaker::new(
        config.provider.breaker_cooldown(),
        config.provider.breaker_failure_threshold,
    ));
    let provider = YahooProvider::new(config.provider.yahoo_options(), breaker)?;
    let store = CsvStore::new(&config.output_dir);
    let downloader = Downloader::new(&provider, &store, &LogProgress, &ThreadSleep, config.plan());

    let tickers = universe.all_tickers();
    let summary = downloader.run(&tickers, Utc::now())?;

    print_summary(&summary, store.output_dir());
    Ok(())
}

fn run_universe(url: Option<String>, out: Option<PathBuf>) -> Result<()> {
    let config = load_config(None)?;
    let url = url.unwrap_or(config.universe_url);
    let client = build_client(&config.provider.user_agent, config.provider.timeout())?;

    let universe =
        scrape_sp500(&client, &url).with_context(|| format!("loading ticker list from {url}"))?;
    let toml = universe.to_toml()?;

    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(&path, toml).with_context(|| format!("writing {}", path.display()))?;
            println!(
                "Saved {} tickers in {} sectors to {}",
                universe.ticker_count(),
                universe.sector_names().len(),
                path.display()
            );
        }
        None => print!("{toml}"),
    }
    Ok(())
}

fn run_status(output_dir: Option<PathBuf>) -> Result<()> {
    let dir = match output_dir {
        Some(dir) => dir,
        None => load_config(None)?.output_dir,
    };

    if !dir.exists() {
        println!("Output directory does not exist: {}", dir.display());
        return Ok(());
    }

    let store = CsvStore::new(&dir);
    let files = store.list()?;
    if files.is_empty() {
        println!("No CSV files in: {}", dir.display());
        return Ok(());
    }

    let total_size: u64 = files.iter().map(|f| f.bytes).sum();
    let total_rows: usize = files.iter().map(|f| f.rows).sum();

    println!("Output: {}", dir.display());
    println!("Tickers: {}", files.len());
    println!("Rows: {total_rows}");
    println!("Total size: {}", format_size(total_size));
    println!();
    println!(
        "{:<8} {:<27} {:<27} {:>9} {:>10}",
        "Symbol", "First", "Last", "Rows", "Size"
    );
    println!("{}", "-".repeat(85));
    for file in &files {
        println!(
            "{:<8} {:<27} {:<27} {:>9} {:>10}",
            file.symbol,
            file.first.as_deref().unwrap_or("-"),
            file.last.as_deref().unwrap_or("-"),
            file.rows,
            format_size(file.bytes)
        );
    }

    Ok(())
}

fn print_summary(summary: &tickgrab_core::data::DownloadSummary, output_dir: &Path) {
    let chunks: usize = summary.tickers.iter().map(|t| t.chunks).sum();
    let without_data = summary.tickers_without_data();

    println!();
    println!("=== Download Summary ===");
    println!("Window:         {} to {}", summary.start, summary.end);
    println!("Tickers:        {}", summary.tickers.len());
    println!("Chunks:         {chunks}");
    println!("Chunks failed:  {}", summary.chunks_failed());
    println!("Rows written:   {}", summary.rows_written());
    println!("Output:         {}", output_dir.display());
    if !without_data.is_empty() {
        println!();
        println!("No data for {} ticker(s): {}", without_data.len(), without_data.join(", "));
    }
    println!();
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
