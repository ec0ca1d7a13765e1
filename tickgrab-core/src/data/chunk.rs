//! Date range partitioning.
//!
//! A requested window is split into half-open chunks `[start, end)` no longer
//! than the provider accepts in one request. Chunks are contiguous: each one
//! starts where the previous one ended, and the last one is truncated to the
//! window end.

use super::provider::DataError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bounded sub-range of the requested window, fetched as one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateChunk {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateChunk {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for DateChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Split `[start, end)` into consecutive chunks of at most `chunk_len`.
///
/// Returns an empty list when `start >= end`. A non-positive `chunk_len`
/// would never advance and is rejected. A step past the representable range
/// ends at `end`.
pub fn chunk_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    chunk_len: Duration,
) -> Result<Vec<DateChunk>, DataError> {
    if chunk_len <= Duration::zero() {
        return Err(DataError::ValidationError(format!(
            "chunk length must be positive, got {chunk_len}"
        )));
    }

    let mut chunks = Vec::new();
    let mut current = start;
    while current < end {
        let next = current
            .checked_add_signed(chunk_len)
            .map_or(end, |next| next.min(end));
        chunks.push(DateChunk {
            start: current,
            end: next,
        });
        current = next;
    }
    Ok(chunks)
}

/// The window ending at `now` and reaching `lookback` into the past.
pub fn lookback_window(
    now: DateTime<Utc>,
    lookback: Duration,
) -> Result<(DateTime<Utc>, DateTime<Utc>), DataError> {
    let start = now.checked_sub_signed(lookback).ok_or_else(|| {
        DataError::ValidationError(format!("lookback of {lookback} reaches before the earliest date"))
    })?;
    Ok((start, now))
}
