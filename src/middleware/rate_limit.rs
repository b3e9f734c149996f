//! Rate limiting middleware.
//!
//! In-memory sliding-window rate limiting per client IP, tracking a per-minute
//! and a per-hour budget independently (`RATE_LIMIT_REQUESTS_PER_MINUTE`,
//! `RATE_LIMIT_REQUESTS_PER_HOUR`). Either budget being exhausted rejects the
//! request. Stale entries are reaped on a fixed cadence rather than per-request.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Configuration for rate limiting.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    /// How often stale per-IP entries are purged.
    pub reap_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 100,
            requests_per_hour: 2000,
            reap_interval: Duration::from_secs(600),
        }
    }
}

struct Window {
    count: u32,
    started_at: Instant,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            started_at: now,
        }
    }

    fn roll(&mut self, now: Instant, span: Duration) {
        if now.duration_since(self.started_at) >= span {
            self.count = 0;
            self.started_at = now;
        }
    }
}

struct RateLimitEntry {
    minute: Window,
    hour: Window,
}

/// Rate limiter state tracking requests per IP, shared via `Arc` for use as
/// axum router state.
#[derive(Clone)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<IpAddr, RateLimitEntry>>>,
}

pub enum RateLimitResult {
    Allowed,
    Exceeded { retry_after: Duration },
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check if request should be allowed, updating both windows.
    pub fn check(&self, ip: IpAddr) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::Allowed;
        }

        let mut state = self.state.lock();
        let now = Instant::now();

        let entry = state.entry(ip).or_insert_with(|| RateLimitEntry {
            minute: Window::new(now),
            hour: Window::new(now),
        });

        entry.minute.roll(now, Duration::from_secs(60));
        entry.hour.roll(now, Duration::from_secs(3600));

        entry.minute.count += 1;
        entry.hour.count += 1;

        if entry.minute.count > self.config.requests_per_minute {
            let reset_at = entry.minute.started_at + Duration::from_secs(60);
            return RateLimitResult::Exceeded {
                retry_after: reset_at.saturating_duration_since(now),
            };
        }

        if entry.hour.count > self.config.requests_per_hour {
            let reset_at = entry.hour.started_at + Duration::from_secs(3600);
            return RateLimitResult::Exceeded {
                retry_after: reset_at.saturating_duration_since(now),
            };
        }

        RateLimitResult::Allowed
    }

    /// Periodic cleanup of stale entries (call from a background task at
    /// `config.reap_interval` cadence).
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();

        state.retain(|_, entry| now.duration_since(entry.hour.started_at) < Duration::from_secs(3600) * 2);
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }
}

/// Rate limiting middleware function.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::extract::State(limiter): axum::extract::State<RateLimitLayer>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = addr.ip();

    match limiter.check(ip) {
        RateLimitResult::Allowed => next.run(request).await,
        RateLimitResult::Exceeded { retry_after } => {
            warn!(
                ip = %ip,
                retry_after_secs = retry_after.as_secs(),
                "rate limit exceeded"
            );

            let body = serde_json::json!({
                "error": "rate_limit_exceeded",
                "message": "Too many requests. Please slow down.",
                "retry_after_seconds": retry_after.as_secs(),
            });

            (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after.as_secs().to_string())],
                axum::Json(body),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_allows_under_limit() {
        let config = RateLimitConfig {
            enabled: true,
            requests_per_minute: 10,
            requests_per_hour: 1000,
            reap_interval: Duration::from_secs(600),
        };
        let limiter = RateLimitLayer::new(config);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..10 {
            match limiter.check(ip) {
                RateLimitResult::Allowed => {}
                _ => panic!("should be allowed"),
            }
        }
    }

    #[test]
    fn test_rate_limit_exceeds_per_minute_budget() {
        let config = RateLimitConfig {
            enabled: true,
            requests_per_minute: 5,
            requests_per_hour: 1000,
            reap_interval: Duration::from_secs(600),
        };
        let limiter = RateLimitLayer::new(config);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..5 {
            assert!(matches!(limiter.check(ip), RateLimitResult::Allowed));
        }

        match limiter.check(ip) {
            RateLimitResult::Exceeded { .. } => {}
            _ => panic!("should be exceeded"),
        }
    }

    #[test]
    fn test_rate_limit_exceeds_per_hour_budget_even_under_minute_limit() {
        let config = RateLimitConfig {
            enabled: true,
            requests_per_minute: 1000,
            requests_per_hour: 3,
            reap_interval: Duration::from_secs(600),
        };
        let limiter = RateLimitLayer::new(config);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..3 {
            assert!(matches!(limiter.check(ip), RateLimitResult::Allowed));
        }

        match limiter.check(ip) {
            RateLimitResult::Exceeded { .. } => {}
            _ => panic!("should be exceeded"),
        }
    }

    #[test]
    fn test_disabled_limiter_always_allows() {
        let config = RateLimitConfig {
            enabled: false,
            requests_per_minute: 1,
            requests_per_hour: 1,
            reap_interval: Duration::from_secs(600),
        };
        let limiter = RateLimitLayer::new(config);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..10 {
            assert!(matches!(limiter.check(ip), RateLimitResult::Allowed));
        }
    }
}
