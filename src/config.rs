//! Runtime configuration loaded from the environment.
//!
//! Follows the `Config::from_env()` shape this codebase already uses
//! elsewhere: `.env` is loaded first (best effort), then each field is
//! parsed with a documented default, never panicking on a bad value.

use crate::db::PoolConfig;
use crate::resilience::circuit_breaker::CircuitBreakerConfig;
use crate::resilience::retry::RetryPolicy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: Option<String>,

    pub ib_bridge_url: String,
    pub memory_service_url: String,
    pub agent0_service_url: String,
    pub dexter_service_url: String,

    pub risk_per_trade: f64,
    pub max_position_pct: f64,
    pub order_type: String,

    pub rate_limit_enabled: bool,
    pub rate_limit_requests_per_minute: u32,
    pub rate_limit_requests_per_hour: u32,

    pub ingestion_poll_interval: Duration,
    pub pool: PoolConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let port = parse_env("PORT", 8080u16);
        let database_url = env_or("DATABASE_URL", "./dexter.db");
        let jwt_secret = std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());

        let ib_bridge_url = env_or("IB_BRIDGE_URL", "http://localhost:5001");
        let memory_service_url = env_or("MEMORY_SERVICE_URL", "http://localhost:8090");
        let agent0_service_url = env_or("AGENT0_SERVICE_URL", "http://localhost:8091");
        let dexter_service_url = env_or("DEXTER_SERVICE_URL", "http://localhost:8092");

        // Clamped per the resource model: riskPerTrade in [0.005, 0.02],
        // maxPositionValuePct in [0.10, 0.30].
        let risk_per_trade = parse_env("RISK_PER_TRADE", 0.01f64).clamp(0.005, 0.02);
        let max_position_pct = parse_env("MAX_POSITION_PCT", 0.20f64).clamp(0.10, 0.30);
        let order_type = env_or("ORDER_TYPE", "bracket");

        let rate_limit_enabled = parse_bool_env("RATE_LIMIT_ENABLED", true);
        let rate_limit_requests_per_minute = parse_env("RATE_LIMIT_REQUESTS_PER_MINUTE", 100u32);
        let rate_limit_requests_per_hour = parse_env("RATE_LIMIT_REQUESTS_PER_HOUR", 2000u32);

        let ingestion_poll_secs = parse_env("INGESTION_POLL_SECS", 30u64);

        let pool = PoolConfig {
            max_open: parse_env("DB_POOL_MAX_OPEN", 25usize),
            max_idle: parse_env("DB_POOL_MAX_IDLE", 5usize),
            conn_max_lifetime: Duration::from_secs(parse_env("DB_POOL_CONN_MAX_LIFETIME_SECS", 300u64)),
            conn_max_idle_time: Duration::from_secs(parse_env("DB_POOL_CONN_MAX_IDLE_SECS", 60u64)),
        }
        .validated();

        let circuit_breaker = CircuitBreakerConfig {
            max_requests: parse_env("CIRCUIT_BREAKER_MAX_REQUESTS", 3u32),
            interval: Duration::from_secs(parse_env("CIRCUIT_BREAKER_INTERVAL_SECS", 10u64)),
            timeout: Duration::from_secs(parse_env("CIRCUIT_BREAKER_TIMEOUT_SECS", 30u64)),
            consecutive_failure_threshold: parse_env("CIRCUIT_BREAKER_CONSECUTIVE_FAILURES", 5u32),
            failure_ratio_threshold: parse_env("CIRCUIT_BREAKER_FAILURE_RATIO", 0.6f64),
            min_requests_for_ratio: parse_env("CIRCUIT_BREAKER_MIN_REQUESTS", 3u32),
        };

        let retry = RetryPolicy {
            initial_delay: Duration::from_secs(parse_env("RETRY_INITIAL_DELAY_SECS", 1u64)),
            factor: parse_env("RETRY_FACTOR", 2.0f64),
            jitter: parse_env("RETRY_JITTER", 0.25f64),
            max_retries: parse_env("RETRY_MAX_RETRIES", 3u32),
        };

        Ok(Self {
            port,
            database_url,
            jwt_secret,
            ib_bridge_url,
            memory_service_url,
            agent0_service_url,
            dexter_service_url,
            risk_per_trade,
            max_position_pct,
            order_type,
            rate_limit_enabled,
            rate_limit_requests_per_minute,
            rate_limit_requests_per_hour,
            ingestion_poll_interval: Duration::from_secs(ingestion_poll_secs),
            pool,
            circuit_breaker,
            retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_per_trade_is_clamped_to_bounds() {
        std::env::set_var("RISK_PER_TRADE", "0.5");
        std::env::set_var("JWT_SECRET", "");
        let config = Config::from_env().unwrap();
        assert_eq!(config.risk_per_trade, 0.02);
        std::env::remove_var("RISK_PER_TRADE");
    }

    #[test]
    fn missing_jwt_secret_disables_auth() {
        std::env::remove_var("JWT_SECRET");
        let config = Config::from_env().unwrap();
        assert!(config.jwt_secret.is_none());
    }
}
