//! Shared blocking HTTP client construction.

use super::provider::DataError;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0 Safari/537.36";

/// Build the blocking client used for both the quote API and the universe page.
pub fn build_client(
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::blocking::Client, DataError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))
}
