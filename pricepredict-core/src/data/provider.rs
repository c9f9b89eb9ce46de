//! Market data source trait and structured fetch errors.
//!
//! The MarketDataSource trait abstracts over remote bar sources (Yahoo
//! Finance today) so the windowed accessor can be exercised against a
//! scripted source in tests. Retry and rate-limit policy live behind this
//! seam; the accessor itself never retries.

use super::interval::TradingInterval;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV bar.
///
/// `timestamp` is the bar's opening time and the unique key within a cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Structured error types for remote fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by source (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: market data source has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("fetch error: {0}")]
    Other(String),
}

/// Trait for remote market data sources.
///
/// `fetch` returns the bars covering `[start, end]` (inclusive) at the given
/// granularity, ascending by timestamp. Implementations may return nothing
/// for sub-ranges with no trading activity; that is not an error.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch OHLCV bars for a symbol over a closed time range.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval: TradingInterval,
    ) -> Result<Vec<Bar>, FetchError>;

    /// Check if the source is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}
