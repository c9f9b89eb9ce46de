//! PricePredict Core — the data supply layer feeding model training.
//!
//! This crate contains everything between a window index and a gap-free
//! slice of historical OHLCV bars:
//! - Bar cache (SQLite, on-disk or in-memory)
//! - Trading interval table
//! - Market data source trait + Yahoo Finance implementation
//! - Windowed dataset accessor (gap detection and fill)
//! - Configuration loading with pluggable validation

pub mod config;
pub mod data;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types that cross the CLI/worker boundary are
    /// Send + Sync. If any type fails this check, the build breaks
    /// immediately.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<data::Bar>();
        require_sync::<data::Bar>();
        require_send::<data::TradingInterval>();
        require_sync::<data::TradingInterval>();
        require_send::<data::WindowSpec>();
        require_sync::<data::WindowSpec>();
        require_send::<data::FetchError>();
        require_sync::<data::FetchError>();
        require_send::<data::YahooSource>();
        require_sync::<data::YahooSource>();
        require_send::<config::Config>();
        require_sync::<config::Config>();

        // The dataset owns a SQLite connection: Send, deliberately not Sync.
        // Concurrent `get` calls must be serialized by the caller.
        require_send::<data::WindowedDataset>();
    }
}
