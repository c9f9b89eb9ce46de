//! Bar cache, trading intervals, market data sources, and windowed access.

pub mod cache;
pub mod circuit_breaker;
pub mod interval;
pub mod provider;
pub mod window;
pub mod yahoo;

pub use cache::{BarCache, CacheError};
pub use circuit_breaker::CircuitBreaker;
pub use interval::{TradingInterval, UnknownInterval};
pub use provider::{Bar, FetchError, MarketDataSource};
pub use window::{WindowError, WindowSpec, WindowedDataset};
pub use yahoo::YahooSource;
