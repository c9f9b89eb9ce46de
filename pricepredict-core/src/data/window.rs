//! Windowed, cache-coherent access to historical OHLCV bars.
//!
//! A `WindowedDataset` maps an integer window index onto an absolute time
//! range, resolves that range against the bar cache, fetches only the
//! missing leading/trailing sub-ranges from the remote source, and returns
//! the complete time-ordered bar set for the window. The cache is a
//! write-through memo of remote fetches: `get(i)` called twice in a row
//! issues no network traffic the second time.
//!
//! The dataset is stateless across calls apart from the cache contents.
//! Indices may be visited in any order. Concurrent `get` calls on one
//! dataset are not supported; callers needing concurrency must serialize.

use super::cache::{BarCache, CacheError};
use super::interval::TradingInterval;
use super::provider::{Bar, FetchError, MarketDataSource};
use crate::config::ConfigError;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Immutable parameters of a windowed dataset — exactly the instrument
/// record the configuration file carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub symbol: String,
    /// First day of coverage (inclusive).
    pub start_date: NaiveDate,
    /// Upper bound of coverage (exclusive, strictly after `start_date`).
    pub end_date: NaiveDate,
    pub interval: TradingInterval,
    /// Bars per window, at least 1.
    pub win_size: u32,
    /// Bars advanced between consecutive windows, at least 1.
    pub win_step: u32,
}

impl WindowSpec {
    /// Check the construction contract: ordered dates, non-zero window
    /// size and step. The interval is already a closed enum, so an unknown
    /// interval name cannot reach this point.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_date >= self.end_date {
            return Err(ConfigError::BadDateRange {
                symbol: self.symbol.clone(),
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.win_size == 0 {
            return Err(ConfigError::ZeroWinSize {
                symbol: self.symbol.clone(),
            });
        }
        if self.win_step == 0 {
            return Err(ConfigError::ZeroWinStep {
                symbol: self.symbol.clone(),
            });
        }
        Ok(())
    }
}

/// Failures surfacing from `get`. Everything propagates to the caller;
/// a window is returned whole or not at all.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("window index {index} out of range for dataset of {len} windows")]
    OutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Window-indexed view over one instrument's bar history.
pub struct WindowedDataset {
    spec: WindowSpec,
    source: Box<dyn MarketDataSource>,
    cache: BarCache,
    coverage_start: NaiveDateTime,
    interval_secs: i64,
    num_bars_total: i64,
    num_windows: usize,
}

impl fmt::Debug for WindowedDataset {
    // Manual impl: the source trait object and the cache connection have
    // no Debug of their own.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowedDataset")
            .field("spec", &self.spec)
            .field("source", &self.source.name())
            .field("num_bars_total", &self.num_bars_total)
            .field("num_windows", &self.num_windows)
            .finish()
    }
}

impl WindowedDataset {
    /// Build a dataset over `spec`, owning its cache exclusively.
    ///
    /// The derived quantities (`num_bars_total`, `num_windows`) are fixed
    /// here for the dataset's lifetime.
    pub fn new(
        spec: WindowSpec,
        source: Box<dyn MarketDataSource>,
        cache: BarCache,
    ) -> Result<Self, ConfigError> {
        spec.validate()?;

        let interval_secs = spec.interval.secs();
        let coverage_start = spec.start_date.and_hms_opt(0, 0, 0).unwrap();
        let coverage_end = spec.end_date.and_hms_opt(0, 0, 0).unwrap();

        let range_secs = (coverage_end - coverage_start).num_seconds();
        let num_bars_total = range_secs / interval_secs;

        let win_size = i64::from(spec.win_size);
        let win_step = i64::from(spec.win_step);
        // A coverage range shorter than one window yields zero windows,
        // never a negative count.
        let num_windows = if num_bars_total < win_size {
            0
        } else {
            ((num_bars_total - win_size) / win_step + 1) as usize
        };

        info!(
            symbol = %spec.symbol,
            start = %spec.start_date,
            end = %spec.end_date,
            interval = %spec.interval,
            num_bars_total,
            win_size = spec.win_size,
            win_step = spec.win_step,
            num_windows,
            "windowed dataset ready"
        );

        Ok(Self {
            spec,
            source,
            cache,
            coverage_start,
            interval_secs,
            num_bars_total,
            num_windows,
        })
    }

    /// Number of windows in the dataset.
    pub fn len(&self) -> usize {
        self.num_windows
    }

    pub fn is_empty(&self) -> bool {
        self.num_windows == 0
    }

    /// Total bars the coverage range holds at this interval.
    pub fn num_bars_total(&self) -> i64 {
        self.num_bars_total
    }

    pub fn spec(&self) -> &WindowSpec {
        &self.spec
    }

    /// Absolute time range `[win_start, win_end]` of window `index`, or
    /// `None` when the index is out of range.
    pub fn window_range(&self, index: usize) -> Option<(NaiveDateTime, NaiveDateTime)> {
        (index < self.num_windows).then(|| self.bounds(index))
    }

    fn bounds(&self, index: usize) -> (NaiveDateTime, NaiveDateTime) {
        let win_start = self.coverage_start
            + Duration::seconds(index as i64 * i64::from(self.spec.win_step) * self.interval_secs);
        let win_end =
            win_start + Duration::seconds(i64::from(self.spec.win_size) * self.interval_secs);
        (win_start, win_end)
    }

    /// Resolve window `index`: detect what the cache is missing, fill it
    /// from the remote source, and return the full ordered bar set for
    /// `[win_start, win_end]` (both ends inclusive).
    pub fn get(&self, index: usize) -> Result<Vec<Bar>, WindowError> {
        if index >= self.num_windows {
            return Err(WindowError::OutOfRange {
                index,
                len: self.num_windows,
            });
        }
        let (win_start, win_end) = self.bounds(index);
        let bar = Duration::seconds(self.interval_secs);

        let cached = self.cache.retrieve(win_start, win_end)?;
        match (cached.first(), cached.last()) {
            // Nothing cached: the whole window is one gap.
            (None, _) | (_, None) => self.fetch_and_insert(win_start, win_end)?,
            (Some(first), Some(last)) => {
                // Leading and trailing gaps are detected and filled
                // independently. A cached sub-range is trusted to be
                // internally contiguous; interior gaps are not repaired.
                if win_start < first.timestamp {
                    self.fetch_and_insert(win_start, first.timestamp - bar)?;
                }
                if last.timestamp < win_end {
                    self.fetch_and_insert(last.timestamp + bar, win_end)?;
                }
            }
        }

        Ok(self.cache.retrieve(win_start, win_end)?)
    }

    /// Fetch `[start, end]` from the remote source and persist it.
    fn fetch_and_insert(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<(), WindowError> {
        debug!(
            symbol = %self.spec.symbol,
            source = self.source.name(),
            %start,
            %end,
            "filling cache gap"
        );
        let fetched = self
            .source
            .fetch(&self.spec.symbol, start, end, self.spec.interval)?;

        // Narrow to the requested sub-range: rows outside it may already be
        // cached, and insertion does not tolerate duplicate timestamps.
        let bars: Vec<Bar> = fetched
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect();
        if bars.is_empty() {
            return Ok(());
        }
        self.cache.insert(&bars)?;
        Ok(())
    }
}
