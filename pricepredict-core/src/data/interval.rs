//! Trading interval table — named sampling granularities and their durations.
//!
//! The set of recognized intervals is closed. A name outside this table is a
//! configuration error at load time, never a runtime fallback.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A bar sampling granularity with a fixed duration in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TradingInterval {
    Min1,
    Min2,
    Min5,
    Min15,
    Min30,
    Min60,
    Min90,
    Hour1,
    Day1,
    Day5,
    Week1,
    Month1,
    Month3,
}

/// Error for an interval name outside the fixed table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown trading interval '{0}'")]
pub struct UnknownInterval(pub String);

impl TradingInterval {
    /// Duration of one bar at this granularity, in seconds.
    pub fn secs(self) -> i64 {
        match self {
            Self::Min1 => 60,
            Self::Min2 => 120,
            Self::Min5 => 300,
            Self::Min15 => 900,
            Self::Min30 => 1_800,
            Self::Min60 | Self::Hour1 => 3_600,
            Self::Min90 => 5_400,
            Self::Day1 => 86_400,
            Self::Day5 => 432_000,
            Self::Week1 => 604_800,
            Self::Month1 => 2_419_200,
            Self::Month3 => 7_257_600,
        }
    }

    /// The canonical name, as the remote source expects it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min2 => "2m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Min60 => "60m",
            Self::Min90 => "90m",
            Self::Hour1 => "1h",
            Self::Day1 => "1d",
            Self::Day5 => "5d",
            Self::Week1 => "1wk",
            Self::Month1 => "1mo",
            Self::Month3 => "3mo",
        }
    }
}

impl FromStr for TradingInterval {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Names are matched case-insensitively with surrounding whitespace
        // ignored, so "1D" and " 1d " in a hand-edited config both resolve.
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" => Ok(Self::Min1),
            "2m" => Ok(Self::Min2),
            "5m" => Ok(Self::Min5),
            "15m" => Ok(Self::Min15),
            "30m" => Ok(Self::Min30),
            "60m" => Ok(Self::Min60),
            "90m" => Ok(Self::Min90),
            "1h" => Ok(Self::Hour1),
            "1d" => Ok(Self::Day1),
            "5d" => Ok(Self::Day5),
            "1wk" => Ok(Self::Week1),
            "1mo" => Ok(Self::Month1),
            "3mo" => Ok(Self::Month3),
            _ => Err(UnknownInterval(s.trim().to_string())),
        }
    }
}

impl TryFrom<String> for TradingInterval {
    type Error = UnknownInterval;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TradingInterval> for String {
    fn from(interval: TradingInterval) -> Self {
        interval.as_str().to_string()
    }
}

impl fmt::Display for TradingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
