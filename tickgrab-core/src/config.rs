//! Downloader configuration.
//!
//! Every field defaults to the values of a plain run: S&P 500 universe,
//! one-minute bars, 30-day lookback in 5-day chunks, 2 seconds between
//! requests, output in `stock_data/`. Precedence is defaults, then the TOML
//! file, then `TICKGRAB_*` environment variables; the CLI applies its flags
//! last.

use crate::data::download::DownloadPlan;
use crate::data::http::DEFAULT_USER_AGENT;
use crate::data::interval::Interval;
use crate::data::universe::SP500_URL;
use crate::data::yahoo::{YahooOptions, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Upper bound for `lookback_days` and `chunk_days`.
pub const MAX_DAYS: i64 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid environment variable {key}={value}: {reason}")]
    Env {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Provider connection, retry and circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_retries: 0,
            retry_base_ms: 500,
            breaker_failure_threshold: 3,
            breaker_cooldown_secs: 30 * 60,
        }
    }
}

impl ProviderConfig {
    pub fn yahoo_options(&self) -> YahooOptions {
        YahooOptions {
            base_url: self.base_url.clone(),
            user_agent: self.user_agent.clone(),
            timeout: self.timeout(),
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

/// Top-level downloader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    pub output_dir: PathBuf,
    pub interval: Interval,
    pub lookback_days: i64,
    pub chunk_days: i64,
    pub request_delay_ms: u64,
    pub universe_url: String,
    pub provider: ProviderConfig,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("stock_data"),
            interval: Interval::OneMinute,
            lookback_days: 30,
            chunk_days: 5,
            request_delay_ms: 2_000,
            universe_url: SP500_URL.to_string(),
            provider: ProviderConfig::default(),
        }
    }
}

impl DownloaderConfig {
    /// Load a config file; missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TICKGRAB_OUTPUT_DIR`, `TICKGRAB_INTERVAL`, `TICKGRAB_LOOKBACK_DAYS`,
    /// `TICKGRAB_CHUNK_DAYS` and `TICKGRAB_REQUEST_DELAY_MS`.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an injectable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = read("TICKGRAB_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(value.trim());
        }
        if let Some(value) = read("TICKGRAB_INTERVAL") {
            self.interval = value.parse::<Interval>().map_err(|e| ConfigError::Env {
                key: "TICKGRAB_INTERVAL".into(),
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(value) = read("TICKGRAB_LOOKBACK_DAYS") {
            self.lookback_days = parse_env("TICKGRAB_LOOKBACK_DAYS", &value)?;
        }
        if let Some(value) = read("TICKGRAB_CHUNK_DAYS") {
            self.chunk_days = parse_env("TICKGRAB_CHUNK_DAYS", &value)?;
        }
        if let Some(value) = read("TICKGRAB_REQUEST_DELAY_MS") {
            self.request_delay_ms = parse_env("TICKGRAB_REQUEST_DELAY_MS", &value)?;
        }
        Ok(())
    }

    /// Reject settings the run cannot work with; warn about provider limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_dir must not be empty".into()));
        }
        check_days("lookback_days", self.lookback_days)?;
        check_days("chunk_days", self.chunk_days)?;
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid("provider.timeout_secs must be positive".into()));
        }
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.base_url must not be empty".into()));
        }

        for warning in self.provider_limit_warnings() {
            tracing::warn!("{warning}");
        }
        Ok(())
    }

    /// Settings Yahoo is known to refuse. Chunks beyond these limits fail at fetch time.
    pub fn provider_limit_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let plan = self.plan();
        if let Some(span) = self.interval.max_request_span() {
            if plan.chunk_len > span {
                warnings.push(format!(
                    "chunk_days={} exceeds the {}-day request limit for {} bars",
                    self.chunk_days,
                    span.num_days(),
                    self.interval
                ));
            }
        }
        if let Some(limit) = self.interval.max_lookback() {
            if plan.lookback > limit {
                warnings.push(format!(
                    "lookback_days={} exceeds the {}-day history kept for {} bars; older chunks will be rejected",
                    self.lookback_days,
                    limit.num_days(),
                    self.interval
                ));
            }
        }
        warnings
    }

    pub fn plan(&self) -> DownloadPlan {
        DownloadPlan {
            interval: self.interval,
            lookback: saturating_days(self.lookback_days),
            chunk_len: saturating_days(self.chunk_days),
            delay: Duration::from_millis(self.request_delay_ms),
        }
    }
}

fn check_days(key: &str, days: i64) -> Result<(), ConfigError> {
    if !(1..=MAX_DAYS).contains(&days) {
        return Err(ConfigError::Invalid(format!(
            "{key} must be between 1 and {MAX_DAYS}, got {days}"
        )));
    }
    Ok(())
}

// Unvalidated configs still produce a plan; chunking rejects what it cannot represent.
fn saturating_days(days: i64) -> chrono::Duration {
    chrono::Duration::try_days(days).unwrap_or(if days < 0 {
        chrono::Duration::MIN
    } else {
        chrono::Duration::MAX
    })
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
