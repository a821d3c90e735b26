//! Bounded retry with capped exponential backoff for provider calls.
//!
//! Shared by the outbound push dispatcher and the cache fetch paths.
//! Only retryable failures are retried; rate limit hints extend the
//! delay but never shorten it.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::PushRetryConfig;
use crate::provider::{SyncError, SyncErrorKind};

/// Backoff before retry attempt `attempts + 1`.
///
/// Exponential from the base interval, capped at the maximum, never
/// shorter than a rate limit hint, with proportional jitter on top.
pub(crate) fn calculate_backoff(
    attempts: u32,
    retry_after_secs: Option<u64>,
    config: &PushRetryConfig,
) -> Duration {
    let exponential = config
        .base_seconds
        .saturating_mul(2u64.saturating_pow(attempts))
        .min(config.max_seconds);
    let backoff = retry_after_secs
        .map(|hint| exponential.max(hint))
        .unwrap_or(exponential);

    let jitter_bound = config.jitter_factor * backoff as f64;
    let jitter = if jitter_bound > 0.0 {
        rand::thread_rng().gen_range(0.0..jitter_bound)
    } else {
        0.0
    };

    Duration::from_secs_f64(backoff as f64 + jitter)
}

/// Run a provider call, retrying retryable failures up to the configured
/// attempt cap.
pub(crate) async fn with_retry<T, F, Fut>(
    op: &str,
    retry: &PushRetryConfig,
    mut call: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let mut attempts: u32 = 0;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempts + 1 < retry.max_attempts => {
                let retry_after = match err.kind {
                    SyncErrorKind::RateLimited { retry_after_secs } => retry_after_secs,
                    _ => None,
                };
                let delay = calculate_backoff(attempts, retry_after, retry);
                warn!(
                    op,
                    attempt = attempts + 1,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "Provider call failed, retrying"
                );
                metrics::counter!("sync_provider_retries_total").increment(1);
                tokio::time::sleep(delay).await;
                attempts += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_wait_config(max_attempts: u32) -> PushRetryConfig {
        PushRetryConfig {
            max_attempts,
            base_seconds: 0,
            max_seconds: 0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let config = PushRetryConfig {
            max_attempts: 5,
            base_seconds: 5,
            max_seconds: 900,
            jitter_factor: 0.0,
        };

        assert_eq!(calculate_backoff(0, None, &config).as_secs(), 5);
        assert_eq!(calculate_backoff(1, None, &config).as_secs(), 10);
        assert_eq!(calculate_backoff(2, None, &config).as_secs(), 20);
        assert_eq!(calculate_backoff(20, None, &config).as_secs(), 900);
    }

    #[test]
    fn test_backoff_honors_rate_limit_hint() {
        let config = PushRetryConfig {
            max_attempts: 5,
            base_seconds: 5,
            max_seconds: 900,
            jitter_factor: 0.0,
        };

        assert_eq!(calculate_backoff(0, Some(120), &config).as_secs(), 120);
        // The hint never shortens an already longer backoff.
        assert_eq!(calculate_backoff(20, Some(120), &config).as_secs(), 900);
    }

    #[test]
    fn test_backoff_jitter_stays_proportional() {
        let config = PushRetryConfig {
            max_attempts: 5,
            base_seconds: 10,
            max_seconds: 900,
            jitter_factor: 0.5,
        };

        for _ in 0..20 {
            let delay = calculate_backoff(0, None, &config).as_secs_f64();
            assert!((10.0..15.0).contains(&delay));
        }
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried_until_success() {
        let calls = AtomicU32::new(0);

        let result = with_retry("op", &no_wait_config(3), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(SyncError::rate_limited(Some(0)))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempt_cap_is_enforced() {
        let calls = AtomicU32::new(0);

        let result: Result<(), SyncError> = with_retry("op", &no_wait_config(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SyncError::transient("still down")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), SyncError> = with_retry("op", &no_wait_config(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SyncError::permanent("bad request")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
