//! Retry/backoff wrapper shared by every outbound provider call.
//!
//! Sequence per attempt: rate-limiter wait, issue the call under a hard
//! timeout, then either return, retry with capped exponential backoff
//! (429/5xx/timeout), or propagate immediately (other 4xx).

use crate::error::ProviderError;
use crate::metrics;
use crate::rate_limiter::RateLimit;
use log::{debug, warn};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            request_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(200),
            backoff_cap: Duration::from_secs(5),
        }
    }
}

/// Resilient single-call wrapper. Both the chain reader and the marketplace
/// reader go through the same instance so they share one quota.
pub struct ResilientFetch {
    limiter: Arc<dyn RateLimit>,
    policy: RetryPolicy,
}

impl ResilientFetch {
    pub fn new(limiter: Arc<dyn RateLimit>, policy: RetryPolicy) -> Self {
        Self { limiter, policy }
    }

    /// Runs `op` with rate limiting, a hard timeout, and bounded retries.
    ///
    /// Retryable failures (`RateLimitExceeded`, `Unavailable`, `Timeout`)
    /// are retried up to `max_retries` times; everything else propagates on
    /// the first occurrence.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            self.limiter.acquire().await;
            metrics::increment_rpc_request(label);

            let outcome = match timeout(self.policy.request_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.policy.request_timeout)),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{}: succeeded after {} retries", label, attempt);
                    }
                    metrics::record_fetch_duration(started.elapsed());
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}",
                        label,
                        attempt + 1,
                        self.policy.max_retries + 1,
                        err,
                        delay
                    );
                    metrics::increment_rpc_retry(label);
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    metrics::increment_rpc_error(label);
                    metrics::record_fetch_duration(started.elapsed());
                    return Err(err);
                }
            }
        }
    }

    /// Capped exponential backoff with up to 100ms of jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .policy
            .backoff_base
            .saturating_mul(1u32 << attempt.min(16));
        let capped = std::cmp::min(exp, self.policy.backoff_cap);
        let jitter_ms = rand::thread_rng().gen_range(0..100);
        capped + Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::NoopLimiter;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fetcher(max_retries: u32) -> ResilientFetch {
        ResilientFetch::new(
            Arc::new(NoopLimiter),
            RetryPolicy {
                max_retries,
                request_timeout: Duration::from_secs(1),
                backoff_base: Duration::from_millis(1),
                backoff_cap: Duration::from_millis(5),
            },
        )
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let fetch = fetcher(3);
        let calls = AtomicU32::new(0);
        let result = fetch
            .run("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ProviderError::Unavailable("flaky".into()))
                } else {
                    Ok(42u32)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_rejections() {
        let fetch = fetcher(3);
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = fetch
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Rejected { status: 400 })
            })
            .await;
        assert!(matches!(result, Err(ProviderError::Rejected { status: 400 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let fetch = fetcher(2);
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = fetch
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::RateLimitExceeded)
            })
            .await;
        assert!(matches!(result, Err(ProviderError::RateLimitExceeded)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
