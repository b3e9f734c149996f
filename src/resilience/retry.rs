//! Exponential backoff with jitter, layered on top of `AppError`'s
//! transient/fatal split: only `Transient` failures are retried, `Fatal`
//! ones are returned immediately. Mirrors the manual retry loop this
//! codebase used for paginated HTTP ingestion, generalized into a reusable
//! helper so every external call site shares the same backoff curve.

use crate::errors::AppError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub factor: f64,
    pub jitter: f64,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            factor: 2.0,
            jitter: 0.25,
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.factor.powi(attempt as i32);
        let jitter_span = base * self.jitter;
        let jittered = rand::thread_rng().gen_range((base - jitter_span)..=(base + jitter_span));
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Runs `op`, retrying on `AppError::Transient` up to `policy.max_retries`
/// times with exponential backoff and jitter. `AppError::Fatal` (and every
/// other variant) is returned on first occurrence without retrying.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(AppError::Transient(message)) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    message,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially_within_jitter_bounds() {
        let policy = RetryPolicy::default();
        let d0 = policy.delay_for(0).as_secs_f64();
        let d1 = policy.delay_for(1).as_secs_f64();
        assert!(d0 >= 0.75 && d0 <= 1.25);
        assert!(d1 >= 1.5 && d1 <= 2.5);
    }

    #[tokio::test]
    async fn retries_transient_and_succeeds_within_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        };

        let result: Result<u32, AppError> = retry_with_backoff(policy, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(AppError::Transient("flaky".into()))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_fatal_errors() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        };

        let result: Result<u32, AppError> = retry_with_backoff(policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Fatal("broken".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_retries: 2,
            ..RetryPolicy::default()
        };

        let result: Result<u32, AppError> = retry_with_backoff(policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Transient("still down".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3); // 1 initial + 2 retries
    }
}
