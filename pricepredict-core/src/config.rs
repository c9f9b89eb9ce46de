//! JSON configuration loading with pluggable validation.
//!
//! The config file carries the instrument list consumed by the windowed
//! dataset constructor, plus the cache directory. Validation is a policy
//! trait rather than a fixed routine so tools can choose how strict to be
//! (and tests can exercise the loader with a permissive policy).

use crate::data::window::WindowSpec;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Configuration problems. All are fatal to loading (or to dataset
/// construction); nothing downstream sees a half-valid config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config lists no instruments")]
    NoInstruments,

    #[error("instrument '{symbol}': start date {start} is not before end date {end}")]
    BadDateRange {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("instrument '{symbol}': window size must be at least 1")]
    ZeroWinSize { symbol: String },

    #[error("instrument '{symbol}': window step must be at least 1")]
    ZeroWinStep { symbol: String },
}

/// Top-level configuration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where per-instrument cache databases live. `None` means every
    /// dataset gets an ephemeral in-memory cache.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    pub instruments: Vec<WindowSpec>,
}

/// Decides whether a parsed config is acceptable.
pub trait ValidationPolicy {
    fn validate(&self, config: &Config) -> Result<(), ConfigError>;
}

/// The standard rule set: at least one instrument, ordered dates, and
/// non-zero window parameters for every instrument. Interval names are
/// already checked during parsing (the interval type is a closed enum).
pub struct StandardPolicy;

impl ValidationPolicy for StandardPolicy {
    fn validate(&self, config: &Config) -> Result<(), ConfigError> {
        if config.instruments.is_empty() {
            return Err(ConfigError::NoInstruments);
        }
        for spec in &config.instruments {
            spec.validate()?;
        }
        Ok(())
    }
}

/// Accepts any config that parsed. For tools that only inspect files.
pub struct Permissive;

impl ValidationPolicy for Permissive {
    fn validate(&self, _config: &Config) -> Result<(), ConfigError> {
        Ok(())
    }
}

impl Config {
    /// Load and validate with the standard policy.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(path, &StandardPolicy)
    }

    /// Load a config file, validating with the given policy.
    pub fn load(path: &Path, policy: &dyn ValidationPolicy) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content)?;
        policy.validate(&config)?;
        debug!(path = %path.display(), instruments = config.instruments.len(), "config loaded");
        Ok(config)
    }

    /// Parse a config from a JSON string (no validation).
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Find the instrument record for `symbol`.
    pub fn instrument(&self, symbol: &str) -> Option<&WindowSpec> {
        self.instruments.iter().find(|spec| spec.symbol == symbol)
    }

    /// Cache database path for one instrument, `None` in in-memory mode.
    ///
    /// One database per instrument+interval pair, so "SPY at 1d" and
    /// "SPY at 1h" never share a timestamp keyspace.
    pub fn cache_path(&self, spec: &WindowSpec) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}_{}.sqlite", spec.symbol, spec.interval)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TradingInterval;

    const SAMPLE: &str = r#"{
        "cache_dir": "data",
        "instruments": [
            {
                "symbol": "SPY",
                "start_date": "2023-01-01",
                "end_date": "2023-06-01",
                "interval": "1d",
                "win_size": 30,
                "win_step": 1
            },
            {
                "symbol": "QQQ",
                "start_date": "2023-01-01",
                "end_date": "2023-02-01",
                "interval": "1h",
                "win_size": 24,
                "win_step": 6
            }
        ]
    }"#;

    #[test]
    fn parses_sample_config() {
        let config = Config::from_json(SAMPLE).unwrap();
        assert_eq!(config.cache_dir, Some(PathBuf::from("data")));
        assert_eq!(config.instruments.len(), 2);

        let spy = config.instrument("SPY").unwrap();
        assert_eq!(spy.interval, TradingInterval::Day1);
        assert_eq!(spy.win_size, 30);
        assert!(config.instrument("IWM").is_none());
    }

    #[test]
    fn standard_policy_accepts_sample() {
        let config = Config::from_json(SAMPLE).unwrap();
        assert!(StandardPolicy.validate(&config).is_ok());
    }

    #[test]
    fn unknown_interval_fails_at_parse() {
        let json = SAMPLE.replace("\"1d\"", "\"42d\"");
        assert!(matches!(
            Config::from_json(&json),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn standard_policy_rejects_empty_instrument_list() {
        let config = Config::from_json(r#"{ "instruments": [] }"#).unwrap();
        assert!(matches!(
            StandardPolicy.validate(&config),
            Err(ConfigError::NoInstruments)
        ));
    }

    #[test]
    fn standard_policy_rejects_unordered_dates() {
        let json = SAMPLE.replace("2023-06-01", "2022-01-01");
        let config = Config::from_json(&json).unwrap();
        assert!(matches!(
            StandardPolicy.validate(&config),
            Err(ConfigError::BadDateRange { .. })
        ));
    }

    #[test]
    fn standard_policy_rejects_zero_window_size() {
        let json = SAMPLE.replace("\"win_size\": 30", "\"win_size\": 0");
        let config = Config::from_json(&json).unwrap();
        assert!(matches!(
            StandardPolicy.validate(&config),
            Err(ConfigError::ZeroWinSize { .. })
        ));
    }

    #[test]
    fn permissive_policy_accepts_what_standard_rejects() {
        let config = Config::from_json(r#"{ "instruments": [] }"#).unwrap();
        assert!(Permissive.validate(&config).is_ok());
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = Config::from_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }

    #[test]
    fn load_applies_the_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickers.json");
        fs::write(&path, r#"{ "instruments": [] }"#).unwrap();

        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::NoInstruments)
        ));
        assert!(Config::load(&path, &Permissive).is_ok());
    }

    #[test]
    fn cache_paths_are_per_instrument_and_interval() {
        let config = Config::from_json(SAMPLE).unwrap();
        let spy = config.instrument("SPY").unwrap();
        let qqq = config.instrument("QQQ").unwrap();

        assert_eq!(
            config.cache_path(spy),
            Some(PathBuf::from("data/SPY_1d.sqlite"))
        );
        assert_eq!(
            config.cache_path(qqq),
            Some(PathBuf::from("data/QQQ_1h.sqlite"))
        );

        let in_memory = Config {
            cache_dir: None,
            instruments: config.instruments.clone(),
        };
        assert_eq!(in_memory.cache_path(spy), None);
    }
}
