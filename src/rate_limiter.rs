//! Outbound call budgeting for quota-constrained providers.
//!
//! The provider quota is global, not per-request: every caller across all
//! concurrent requests shares one limiter instance (injected as an `Arc`),
//! and calls are admitted in arrival order. Tests substitute [`NoopLimiter`].

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;
use std::num::NonZeroU32;
use std::time::Duration;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Safety margin shaved off the configured calls-per-second budget so
/// bursts never brush the provider's hard quota.
pub const SAFETY_MARGIN: f64 = 0.15;

#[async_trait]
pub trait RateLimit: Send + Sync {
    /// Resolves once it is safe to issue the next outbound call.
    async fn acquire(&self);
}

/// Process-wide rate limiter for a single provider quota.
///
/// The effective rate is `calls_per_second * (1 - SAFETY_MARGIN)`, expressed
/// as a minimum inter-call interval. Waiters are admitted strictly in
/// arrival order; there is no priority lane.
pub struct ProviderRateLimiter {
    limiter: DirectRateLimiter,
    min_interval: Duration,
}

impl ProviderRateLimiter {
    pub fn new(calls_per_second: u32) -> Self {
        let effective = (calls_per_second.max(1) as f64) * (1.0 - SAFETY_MARGIN);
        let min_interval = Duration::from_secs_f64(1.0 / effective);
        let quota = Quota::with_period(min_interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).expect("nonzero")));
        debug!(
            "ProviderRateLimiter: budget={}cps effective={:.2}cps interval={:?}",
            calls_per_second, effective, min_interval
        );
        Self {
            limiter: RateLimiter::direct(quota),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[async_trait]
impl RateLimit for ProviderRateLimiter {
    async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

/// No-op limiter for tests and offline replays.
pub struct NoopLimiter;

#[async_trait]
impl RateLimit for NoopLimiter {
    async fn acquire(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn serializes_calls_at_the_effective_rate() {
        // 20 cps budget -> 17 cps effective -> ~58.8ms between calls.
        let limiter = ProviderRateLimiter::new(20);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        // Nine inter-call gaps at ~58.8ms each, minus scheduling slack.
        assert!(
            start.elapsed() >= Duration::from_millis(450),
            "10 calls finished too fast: {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn noop_limiter_never_waits() {
        let limiter = NoopLimiter;
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
