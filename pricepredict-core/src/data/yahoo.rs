//! Yahoo Finance market data source.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API at any interval from the
//! trading interval table. Handles rate limiting, retries with exponential
//! backoff, response parsing, and the circuit breaker. The windowed
//! accessor above this layer never retries; all of that policy lives here.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; parsing failures surface as `FetchError::MalformedResponse`.

use super::circuit_breaker::CircuitBreaker;
use super::interval::TradingInterval;
use super::provider::{Bar, FetchError, MarketDataSource};
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

/// Yahoo Finance source.
pub struct YahooSource {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooSource {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Build the chart API URL for a symbol, closed time range, and interval.
    ///
    /// `period2` is padded by one bar because the API treats it as an open
    /// bound while our fetch contract is closed; the result is trimmed back
    /// to `[start, end]` after parsing.
    fn chart_url(
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval: TradingInterval,
    ) -> String {
        let period1 = start.and_utc().timestamp();
        let period2 = end.and_utc().timestamp() + interval.secs();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={period1}&period2={period2}&interval={}",
            interval.as_str()
        )
    }

    /// Parse the chart API response into bars, narrowed to the five OHLCV
    /// fields.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<Bar>, FetchError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    FetchError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    FetchError::MalformedResponse(format!("{}: {}", err.code, err.description))
                }
            } else {
                FetchError::MalformedResponse("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::MalformedResponse("result array is empty".into()))?;

        let timestamps = data
            .timestamp
            .ok_or_else(|| FetchError::MalformedResponse("no timestamps".into()))?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::MalformedResponse("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| {
                    FetchError::MalformedResponse(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Rows where every field is null are non-trading periods.
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            bars.push(Bar {
                timestamp,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0.0),
            });
        }

        // A gap fetch can land entirely on a weekend or holiday, in which
        // case every row is non-trading and zero bars is the right answer.
        // Unknown symbols are reported through the explicit "Not Found"
        // error code above, not inferred from an empty result.
        Ok(bars)
    }

    /// Execute the request with retry and circuit breaker logic.
    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval: TradingInterval,
    ) -> Result<Vec<Bar>, FetchError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(FetchError::CircuitBreakerTripped);
        }

        let url = Self::chart_url(symbol, start, end, interval);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(FetchError::CircuitBreakerTripped);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        // IP ban: stop immediately
                        self.circuit_breaker.trip();
                        return Err(FetchError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(FetchError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(FetchError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        FetchError::MalformedResponse(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    let bars = Self::parse_response(symbol, chart)?;
                    self.circuit_breaker.record_success();
                    return Ok(bars);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(FetchError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(FetchError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Other("max retries exceeded".into())))
    }
}

impl MarketDataSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval: TradingInterval,
    ) -> Result<Vec<Bar>, FetchError> {
        let mut bars = self.fetch_with_retry(symbol, start, end, interval)?;
        // Trim the period2 padding back to the closed contract range.
        bars.retain(|b| b.timestamp >= start && b.timestamp <= end);
        Ok(bars)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(symbol: &str, json: &str) -> Result<Vec<Bar>, FetchError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooSource::parse_response(symbol, resp)
    }

    #[test]
    fn parses_quote_rows_into_bars() {
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1672531200, 1672617600],
                    "indicators": {
                        "quote": [{
                            "open":   [100.0, 101.0],
                            "high":   [102.0, 103.0],
                            "low":    [99.0, 100.0],
                            "close":  [101.0, 102.0],
                            "volume": [1000, 1100]
                        }]
                    }
                }],
                "error": null
            }
        }"#;

        let bars = parse("SPY", json).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0].timestamp,
            NaiveDate::from_ymd_opt(2023, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[1].close, 102.0);
        assert_eq!(bars[1].volume, 1100.0);
    }

    #[test]
    fn all_null_rows_are_skipped() {
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1672531200, 1672617600],
                    "indicators": {
                        "quote": [{
                            "open":   [100.0, null],
                            "high":   [102.0, null],
                            "low":    [99.0, null],
                            "close":  [101.0, null],
                            "volume": [1000, null]
                        }]
                    }
                }],
                "error": null
            }
        }"#;

        let bars = parse("SPY", json).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn range_with_no_trading_activity_yields_no_bars_not_an_error() {
        // A weekend/holiday gap fetch comes back well-formed with every
        // row null. That must be an empty result, not SymbolNotFound,
        // or windows touching non-trading days fail permanently.
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1672531200],
                    "indicators": {
                        "quote": [{
                            "open":   [null],
                            "high":   [null],
                            "low":    [null],
                            "close":  [null],
                            "volume": [null]
                        }]
                    }
                }],
                "error": null
            }
        }"#;

        let bars = parse("SPY", json).unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let json = r#"{
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found" }
            }
        }"#;

        let err = parse("NOPE", json).unwrap_err();
        assert!(matches!(err, FetchError::SymbolNotFound { .. }));
    }

    #[test]
    fn missing_timestamps_is_malformed() {
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": null,
                    "indicators": { "quote": [] }
                }],
                "error": null
            }
        }"#;

        let err = parse("SPY", json).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn chart_url_carries_interval_and_padded_period() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 1, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let url = YahooSource::chart_url("SPY", start, end, TradingInterval::Day1);
        assert!(url.contains("/chart/SPY"));
        assert!(url.contains("interval=1d"));
        assert!(url.contains(&format!("period1={}", start.and_utc().timestamp())));
        assert!(url.contains(&format!(
            "period2={}",
            end.and_utc().timestamp() + 86_400
        )));
    }
}
