//! Circuit breaker wrapping calls to an external dependency (the broker
//! bridge, primarily). Three states — closed, open, half-open — following
//! the same trip/record-success/record-failure shape as this codebase's
//! source-health kill-switch, generalized to the exact settings spec.md
//! requires: `maxRequests`, `interval`, `timeout`, and a trip condition of
//! `consecutiveFailures >= 5 OR failureRatio >= 0.6 over >= 3 requests`.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Number of trial requests allowed through while half-open.
    pub max_requests: u32,
    /// Length of the closed-state rolling window used for the failure ratio.
    pub interval: Duration,
    /// How long the breaker stays open before trying a half-open probe.
    pub timeout: Duration,
    pub consecutive_failure_threshold: u32,
    pub failure_ratio_threshold: f64,
    pub min_requests_for_ratio: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_requests: 3,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            consecutive_failure_threshold: 5,
            failure_ratio_threshold: 0.6,
            min_requests_for_ratio: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    opened_at: Option<Instant>,
    window_started_at: Instant,
    requests: u32,
    failures: u32,
    consecutive_failures: u32,
    half_open_probes: u32,
}

/// Thread-safe circuit breaker. Cheap to clone (wraps an `Arc`-free mutex
/// behind `parking_lot`, so it must itself be wrapped in `Arc` by the owner
/// if shared across tasks).
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                opened_at: None,
                window_started_at: Instant::now(),
                requests: 0,
                failures: 0,
                consecutive_failures: 0,
                half_open_probes: 0,
            }),
        }
    }

    /// Returns `true` if a call may proceed; transitions Open -> HalfOpen
    /// once `timeout` has elapsed.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if inner.state == State::Closed
            && now.duration_since(inner.window_started_at) >= self.config.interval
        {
            inner.window_started_at = now;
            inner.requests = 0;
            inner.failures = 0;
        }

        match inner.state {
            State::Closed => true,
            State::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                if now.duration_since(opened_at) >= self.config.timeout {
                    inner.state = State::HalfOpen;
                    inner.half_open_probes = 0;
                    true
                } else {
                    false
                }
            }
            State::HalfOpen => inner.half_open_probes < self.config.max_requests,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;

        match inner.state {
            State::Closed => {
                inner.requests += 1;
            }
            State::HalfOpen => {
                inner.half_open_probes += 1;
                if inner.half_open_probes >= self.config.max_requests {
                    inner.state = State::Closed;
                    inner.opened_at = None;
                    inner.window_started_at = Instant::now();
                    inner.requests = 0;
                    inner.failures = 0;
                }
            }
            State::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;

        match inner.state {
            State::Closed => {
                inner.requests += 1;
                inner.failures += 1;

                let ratio_trip = inner.requests >= self.config.min_requests_for_ratio
                    && (inner.failures as f64 / inner.requests as f64)
                        >= self.config.failure_ratio_threshold;
                let consecutive_trip =
                    inner.consecutive_failures >= self.config.consecutive_failure_threshold;

                if ratio_trip || consecutive_trip {
                    self.trip(&mut inner, ratio_trip, consecutive_trip);
                }
            }
            State::HalfOpen => {
                self.trip(&mut inner, false, true);
            }
            State::Open => {}
        }
    }

    fn trip(&self, inner: &mut Inner, ratio_trip: bool, consecutive_trip: bool) {
        inner.state = State::Open;
        inner.opened_at = Some(Instant::now());
        warn!(
            breaker = self.name,
            ratio_trip, consecutive_trip, "circuit breaker tripped"
        );
        crate::metrics::record_circuit_breaker_trip(self.name);
    }

    pub fn is_open(&self) -> bool {
        matches!(self.inner.lock().state, State::Open)
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &inner.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            max_requests: 3,
            interval: Duration::from_secs(10),
            timeout: Duration::from_millis(50),
            consecutive_failure_threshold: 5,
            failure_ratio_threshold: 0.6,
            min_requests_for_ratio: 3,
        }
    }

    #[test]
    fn trips_on_consecutive_failures() {
        let cb = CircuitBreaker::new("test", test_config());
        for _ in 0..5 {
            assert!(cb.allow());
            cb.record_failure();
        }
        assert!(cb.is_open());
        assert!(!cb.allow());
    }

    #[test]
    fn trips_on_failure_ratio() {
        let cb = CircuitBreaker::new("test", test_config());
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        // 2/3 failures = 0.66 >= 0.6, at min_requests_for_ratio=3
        assert!(cb.is_open());
    }

    #[test]
    fn half_opens_after_timeout_and_closes_on_success() {
        let cb = CircuitBreaker::new("test", test_config());
        for _ in 0..5 {
            cb.allow();
            cb.record_failure();
        }
        assert!(cb.is_open());

        std::thread::sleep(Duration::from_millis(60));
        assert!(cb.allow()); // half-open probe allowed

        for _ in 0..3 {
            cb.record_success();
        }
        assert!(!cb.is_open());
        assert!(cb.allow());
    }
}
