use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::provider::DataError;

/// Sampling intervals accepted by the Yahoo chart API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "2m")]
    TwoMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "60m")]
    SixtyMinutes,
    #[serde(rename = "90m")]
    NinetyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    pub const ALL: [Self; 9] = [
        Self::OneMinute,
        Self::TwoMinutes,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::SixtyMinutes,
        Self::NinetyMinutes,
        Self::OneHour,
        Self::OneDay,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::TwoMinutes => "2m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::SixtyMinutes => "60m",
            Self::NinetyMinutes => "90m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
        }
    }

    /// Longest span Yahoo serves in a single request at this interval.
    pub fn max_request_span(self) -> Option<Duration> {
        match self {
            Self::OneMinute => Some(Duration::days(7)),
            Self::TwoMinutes
            | Self::FiveMinutes
            | Self::FifteenMinutes
            | Self::ThirtyMinutes
            | Self::NinetyMinutes => Some(Duration::days(60)),
            Self::SixtyMinutes | Self::OneHour => Some(Duration::days(730)),
            Self::OneDay => None,
        }
    }

    /// How far back Yahoo keeps data at this interval.
    pub fn max_lookback(self) -> Option<Duration> {
        match self {
            Self::OneMinute => Some(Duration::days(30)),
            Self::TwoMinutes
            | Self::FiveMinutes
            | Self::FifteenMinutes
            | Self::ThirtyMinutes
            | Self::NinetyMinutes => Some(Duration::days(60)),
            Self::SixtyMinutes | Self::OneHour => Some(Duration::days(730)),
            Self::OneDay => None,
        }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = DataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_str() == normalized)
            .ok_or_else(|| {
                DataError::ValidationError(format!("unsupported interval '{}'", value.trim()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interval() {
        let interval = Interval::from_str(" 1M ").expect("must parse");
        assert_eq!(interval, Interval::OneMinute);
        assert_eq!(Interval::from_str("90m").unwrap(), Interval::NinetyMinutes);
    }

    #[test]
    fn rejects_invalid_interval() {
        let err = Interval::from_str("2h").expect_err("must fail");
        assert!(matches!(err, DataError::ValidationError(_)));
    }

    #[test]
    fn display_matches_query_value() {
        for interval in Interval::ALL {
            assert_eq!(interval.to_string().parse::<Interval>().unwrap(), interval);
        }
    }

    #[test]
    fn minute_limits() {
        assert_eq!(Interval::OneMinute.max_request_span(), Some(Duration::days(7)));
        assert_eq!(Interval::OneMinute.max_lookback(), Some(Duration::days(30)));
        assert_eq!(Interval::OneDay.max_lookback(), None);
    }
}
