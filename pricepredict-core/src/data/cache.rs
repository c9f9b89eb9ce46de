//! SQLite-backed bar cache.
//!
//! One table of OHLCV rows keyed by bar timestamp (Unix seconds, a sortable
//! stand-in for ISO strings), holding everything ever fetched for a single
//! instrument+interval pair. Supports a durable on-disk mode and an
//! ephemeral in-memory mode.
//!
//! The connection is released when the cache is dropped (RAII); nothing
//! here depends on finalizer timing for a commit — every `insert` commits
//! its own transaction before returning.
//!
//! Contract notes:
//! - `retrieve` bounds are both inclusive.
//! - `insert` is a plain INSERT: re-inserting an already-cached timestamp
//!   is a storage error. Duplicate avoidance is the caller's job.

use super::provider::Bar;
use chrono::{DateTime, NaiveDateTime};
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;

/// Storage failures. These are fatal to the operation that hit them; there
/// is no degraded mode.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("bar store: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("bar store holds an unrepresentable timestamp: {0}")]
    BadTimestamp(i64),
}

const CREATE_BARS: &str = "CREATE TABLE IF NOT EXISTS bars (
    ts     INTEGER PRIMARY KEY,
    open   REAL NOT NULL,
    high   REAL NOT NULL,
    low    REAL NOT NULL,
    close  REAL NOT NULL,
    volume REAL NOT NULL
)";

/// Durable, time-ordered store of bars for one instrument+interval.
pub struct BarCache {
    conn: Connection,
}

impl BarCache {
    /// Open (creating if needed) an on-disk cache at `path`.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        Self::init(Connection::open(path)?)
    }

    /// Open an ephemeral cache that lives only as long as this value.
    pub fn in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute(CREATE_BARS, [])?;
        Ok(Self { conn })
    }

    /// Persist bars, in any order, inside a single transaction.
    ///
    /// Fails (and rolls back wholesale) if the store is unavailable or any
    /// bar's timestamp is already present.
    pub fn insert(&self, bars: &[Bar]) -> Result<(), CacheError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO bars (ts, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for bar in bars {
                stmt.execute(params![
                    bar.timestamp.and_utc().timestamp(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All bars with `start <= timestamp <= end`, ascending by timestamp.
    ///
    /// Both bounds inclusive. An empty range is an empty vec, never an error.
    pub fn retrieve(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, CacheError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT ts, open, high, low, close, volume
             FROM bars
             WHERE ts BETWEEN ?1 AND ?2
             ORDER BY ts",
        )?;
        let rows = stmt.query_map(
            params![
                start.and_utc().timestamp(),
                end.and_utc().timestamp()
            ],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            },
        )?;

        let mut bars = Vec::new();
        for row in rows {
            let (ts, open, high, low, close, volume) = row?;
            let timestamp = DateTime::from_timestamp(ts, 0)
                .ok_or(CacheError::BadTimestamp(ts))?
                .naive_utc();
            bars.push(Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }
        Ok(bars)
    }

    /// Total number of cached bars.
    pub fn bar_count(&self) -> Result<u64, CacheError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM bars", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Earliest and latest cached timestamps, `None` while empty.
    pub fn span(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>, CacheError> {
        let bounds: (Option<i64>, Option<i64>) = self.conn.query_row(
            "SELECT MIN(ts), MAX(ts) FROM bars",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        match bounds {
            (Some(min), Some(max)) => {
                let lo = DateTime::from_timestamp(min, 0)
                    .ok_or(CacheError::BadTimestamp(min))?
                    .naive_utc();
                let hi = DateTime::from_timestamp(max, 0)
                    .ok_or(CacheError::BadTimestamp(max))?
                    .naive_utc();
                Ok(Some((lo, hi)))
            }
            _ => Ok(None),
        }
    }
}
