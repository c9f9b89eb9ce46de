//! Circuit breaker for market data source rate limiting and IP bans.
//!
//! Repeated failures (or a single hard block from the source) open the
//! breaker, and every request is refused until the cooldown elapses. This
//! keeps a misbehaving fetch loop from hammering the source while banned.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BreakerInner {
    /// When the breaker opened; `None` while closed.
    opened_at: Option<Instant>,
    consecutive_failures: u32,
}

/// Shared breaker guarding one remote source.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    /// Breaker with the given cooldown, opening after 3 consecutive failures.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                opened_at: None,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: 3,
        }
    }

    /// Default for public market data sources: 30-minute cooldown.
    pub fn default_source() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }

    /// Check if requests are currently allowed. An expired cooldown closes
    /// the breaker again as a side effect.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.opened_at {
            None => true,
            Some(opened_at) if opened_at.elapsed() >= self.cooldown => {
                inner.opened_at = None;
                inner.consecutive_failures = 0;
                true
            }
            Some(_) => false,
        }
    }

    /// Record a successful request, resetting the failure counter.
    pub fn record_success(&self) {
        self.inner.lock().unwrap().consecutive_failures = 0;
    }

    /// Record a failed request; at the threshold the breaker opens.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Open the breaker immediately (HTTP 403 / IP ban).
    pub fn trip(&self) {
        self.inner.lock().unwrap().opened_at = Some(Instant::now());
    }

    /// Remaining cooldown time, zero while closed.
    pub fn remaining_cooldown(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        match inner.opened_at {
            None => Duration::ZERO,
            Some(opened_at) => self.cooldown.saturating_sub(opened_at.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::new(Duration::from_secs(60));
        assert!(cb.is_allowed());
        assert_eq!(cb.remaining_cooldown(), Duration::ZERO);
    }

    #[test]
    fn opens_at_failure_threshold() {
        let cb = CircuitBreaker::new(Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_allowed());
        cb.record_failure();
        assert!(!cb.is_allowed());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = CircuitBreaker::new(Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert!(cb.is_allowed());
    }

    #[test]
    fn trip_opens_immediately() {
        let cb = CircuitBreaker::new(Duration::from_secs(60));
        cb.trip();
        assert!(!cb.is_allowed());
        assert!(cb.remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn closes_again_after_cooldown() {
        let cb = CircuitBreaker::new(Duration::from_millis(10));
        cb.trip();
        assert!(!cb.is_allowed());
        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.is_allowed());
    }
}
