//! Universe configuration: sector-organized ticker lists.
//!
//! The default universe is scraped from the Wikipedia list of S&P 500
//! constituents (Symbol and GICS Sector columns). A universe can also be
//! stored as a TOML file for offline or curated runs, or built from an
//! explicit symbol list.

use super::provider::DataError;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const SP500_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

/// Sector name used when the source gives none.
pub const UNCLASSIFIED: &str = "Unclassified";

/// The complete universe configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataError::UniverseError(format!("read universe file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        let parsed: Self = toml::from_str(content)
            .map_err(|e| DataError::UniverseError(format!("parse universe TOML: {e}")))?;
        let mut universe = Self::default();
        for (sector, tickers) in parsed.sectors {
            for ticker in tickers {
                universe.insert(&sector, &ticker);
            }
        }
        Ok(universe)
    }

    /// Build an unclassified universe from explicit symbols.
    pub fn from_symbols<S: AsRef<str>>(symbols: &[S]) -> Self {
        let mut universe = Self::default();
        for symbol in symbols {
            universe.insert(UNCLASSIFIED, symbol.as_ref());
        }
        universe
    }

    /// Add a ticker under `sector`, normalised for the provider.
    ///
    /// Returns false for blanks and for symbols already present in any sector.
    pub fn insert(&mut self, sector: &str, ticker: &str) -> bool {
        let symbol = normalize_symbol(ticker);
        if symbol.is_empty() || self.contains(&symbol) {
            return false;
        }
        let sector = match sector.trim() {
            "" => UNCLASSIFIED,
            s => s,
        };
        self.sectors.entry(sector.to_string()).or_default().push(symbol);
        true
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.sectors.values().any(|v| v.iter().any(|t| t == symbol))
    }

    /// Get all tickers across all sectors.
    pub fn all_tickers(&self) -> Vec<&str> {
        self.sectors
            .values()
            .flat_map(|tickers| tickers.iter().map(|t| t.as_str()))
            .collect()
    }

    /// Get tickers for a specific sector.
    pub fn sector_tickers(&self, sector: &str) -> Option<&[String]> {
        self.sectors.get(sector).map(|v| v.as_slice())
    }

    /// Get the list of sector names.
    pub fn sector_names(&self) -> Vec<&str> {
        self.sectors.keys().map(|s| s.as_str()).collect()
    }

    /// Total number of tickers.
    pub fn ticker_count(&self) -> usize {
        self.sectors.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ticker_count() == 0
    }

    /// Keep only the named sectors (case-insensitive). Returns names that matched nothing.
    pub fn retain_sectors<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let wanted: Vec<String> = names.iter().map(|n| n.as_ref().to_lowercase()).collect();
        let unknown = wanted
            .iter()
            .filter(|w| !self.sectors.keys().any(|k| k.to_lowercase() == **w))
            .cloned()
            .collect();
        self.sectors
            .retain(|sector, _| wanted.contains(&sector.to_lowercase()));
        unknown
    }

    /// Serialize the universe to TOML.
    pub fn to_toml(&self) -> Result<String, DataError> {
        toml::to_string_pretty(self)
            .map_err(|e| DataError::UniverseError(format!("serialize universe: {e}")))
    }
}

/// Convert a listing symbol to Yahoo's form (`BRK.B` → `BRK-B`).
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_ascii_uppercase().replace('.', "-")
}

/// Fetch the S&P 500 constituents page and parse its ticker table.
pub fn scrape_sp500(client: &reqwest::blocking::Client, url: &str) -> Result<Universe, DataError> {
    tracing::info!(%url, "loading S&P 500 constituents");
    let resp = client
        .get(url)
        .send()
        .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(DataError::UniverseError(format!(
            "HTTP {status} fetching {url}"
        )));
    }

    let body = resp
        .text()
        .map_err(|e| DataError::UniverseError(format!("read body from {url}: {e}")))?;
    parse_constituents_table(&body)
}

fn selector(css: &str) -> Result<Selector, DataError> {
    Selector::parse(css)
        .map_err(|e| DataError::UniverseError(format!("invalid selector '{css}': {e:?}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse the first HTML table whose header row has a `Symbol` column.
///
/// The `GICS Sector` column is optional; rows without it go to [`UNCLASSIFIED`].
pub fn parse_constituents_table(html: &str) -> Result<Universe, DataError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let header_sel = selector("th")?;
    let cell_sel = selector("td")?;

    for table in document.select(&table_sel) {
        let mut rows = table.select(&row_sel);
        let Some(header) = rows.next() else {
            continue;
        };
        let headers: Vec<String> = header.select(&header_sel).map(cell_text).collect();
        let Some(symbol_col) = headers.iter().position(|h| h == "Symbol") else {
            continue;
        };
        let sector_col = headers.iter().position(|h| h == "GICS Sector");

        let mut universe = Universe::default();
        let mut seen_rows = HashSet::new();
        for row in rows {
            let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
            let Some(symbol) = cells.get(symbol_col) else {
                continue;
            };
            if !seen_rows.insert(symbol.clone()) {
                continue;
            }
            let sector = sector_col
                .and_then(|c| cells.get(c))
                .map(String::as_str)
                .unwrap_or(UNCLASSIFIED);
            universe.insert(sector, symbol);
        }

        if universe.is_empty() {
            return Err(DataError::UniverseError(
                "constituents table has no symbols".into(),
            ));
        }
        tracing::debug!(
            tickers = universe.ticker_count(),
            sectors = universe.sectors.len(),
            "parsed constituents table"
        );
        return Ok(universe);
    }

    Err(DataError::UniverseError(
        "no table with a Symbol column found".into(),
    ))
}
