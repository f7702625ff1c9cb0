use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use super::config::{RateLimiterConfig, RateLimitStrategy};
use super::sliding_window::SlidingWindow;
use super::token_bucket::TokenBucket;

/// Why an `execute` call did not return the operation's own result.
#[derive(Debug, Error)]
pub enum RateLimitError<E> {
    /// The limiter rejected the call; the operation was never invoked.
    #[error(
        "rate limit exceeded for '{name}': {limit} requests per {}ms, retry in {}ms",
        .window.as_millis(),
        .retry_after.as_millis()
    )]
    Limited {
        name: String,
        limit: u32,
        window: Duration,
        retry_after: Duration,
    },

    /// The operation ran and failed; its error passes through unchanged.
    #[error("{0}")]
    Inner(E),
}

impl<E> RateLimitError<E> {
    /// True when the limiter rejected the call without running it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Limited { .. })
    }
}

/// Cumulative counters for one limiter.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub allowed_requests: u64,
    pub blocked_requests: u64,
    /// Milliseconds since the limiter was created or last reset.
    pub since_reset_ms: u64,
}

/// Point-in-time view of a limiter, cheap to clone and serialize.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterSnapshot {
    pub name: String,
    pub strategy: RateLimitStrategy,
    pub limit: u32,
    pub window_ms: u64,
    /// Tokens left (bucket) or free slots (window).
    pub available: f64,
    /// Estimated wait until the next request could be admitted, if currently
    /// exhausted.
    pub estimated_wait_ms: Option<u64>,
    pub stats: RateLimiterStats,
}

enum Throttle {
    Bucket(TokenBucket),
    Window(SlidingWindow),
}

struct LimiterState {
    throttle: Throttle,
    total_requests: u64,
    allowed_requests: u64,
    blocked_requests: u64,
    last_reset: Instant,
}

/// Load shedding for one named resource, using either a token bucket or a
/// sliding window (see [`RateLimitStrategy`]).
///
/// Capacity checks are synchronous and never await; rejected calls never
/// start the wrapped operation, so a limiter rejection can never register as
/// a failure on a downstream circuit breaker.
pub struct RateLimiter {
    name: String,
    config: RateLimiterConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Self {
        let now = Instant::now();
        let throttle = match config.strategy {
            RateLimitStrategy::TokenBucket => Throttle::Bucket(TokenBucket::new(
                config.capacity(),
                config.refill_rate(),
                Duration::from_secs(1),
                now,
            )),
            RateLimitStrategy::SlidingWindow => Throttle::Window(SlidingWindow::new(
                config.max_requests as usize,
                config.window,
            )),
        };
        Self {
            name: name.into(),
            config,
            state: Mutex::new(LimiterState {
                throttle,
                total_requests: 0,
                allowed_requests: 0,
                blocked_requests: 0,
                last_reset: now,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Try to acquire one permit without waiting.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_weighted(1)
    }

    /// Try to acquire `cost` permits. The sliding-window strategy counts
    /// every admitted call as one request regardless of cost.
    pub fn try_acquire_weighted(&self, cost: u32) -> bool {
        self.admit(cost).is_ok()
    }

    /// Execute an operation under this limiter.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, RateLimitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_weighted(operation, 1).await
    }

    /// Execute with an operation cost greater than one permit.
    pub async fn execute_weighted<T, E, F, Fut>(
        &self,
        operation: F,
        cost: u32,
    ) -> Result<T, RateLimitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.admit(cost) {
            Ok(()) => operation().await.map_err(RateLimitError::Inner),
            Err(retry_after) => {
                tracing::debug!(
                    limiter = %self.name,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "rate limit exceeded"
                );
                Err(RateLimitError::Limited {
                    name: self.name.clone(),
                    limit: self.config.max_requests,
                    window: self.config.window,
                    retry_after,
                })
            }
        }
    }

    fn admit(&self, cost: u32) -> Result<(), Duration> {
        let now = Instant::now();
        let mut st = self.lock_state();
        st.total_requests += 1;
        let allowed = match &mut st.throttle {
            Throttle::Bucket(bucket) => bucket.try_consume(cost as f64, now),
            Throttle::Window(window) => window.try_request(now),
        };
        if allowed {
            st.allowed_requests += 1;
            Ok(())
        } else {
            st.blocked_requests += 1;
            let retry_after = match &mut st.throttle {
                Throttle::Bucket(bucket) => bucket.time_until_next_token(now),
                Throttle::Window(window) => window.time_until_reset(now),
            };
            Err(retry_after)
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        let st = self.lock_state();
        Self::stats_locked(&st)
    }

    pub fn snapshot(&self) -> RateLimiterSnapshot {
        let now = Instant::now();
        let mut st = self.lock_state();
        let (available, wait) = match &mut st.throttle {
            Throttle::Bucket(bucket) => {
                let available = bucket.available(now);
                let wait = if available >= 1.0 {
                    None
                } else {
                    Some(bucket.time_until_next_token(now))
                };
                (available, wait)
            }
            Throttle::Window(window) => {
                let free = window.max_requests().saturating_sub(window.in_window(now));
                let wait = if free > 0 {
                    None
                } else {
                    Some(window.time_until_reset(now))
                };
                (free as f64, wait)
            }
        };
        RateLimiterSnapshot {
            name: self.name.clone(),
            strategy: self.config.strategy,
            limit: self.config.max_requests,
            window_ms: self.config.window.as_millis() as u64,
            available,
            estimated_wait_ms: wait.map(|w| w.as_millis() as u64),
            stats: Self::stats_locked(&st),
        }
    }

    /// Restore full capacity and zero the counters.
    pub fn reset(&self) {
        let now = Instant::now();
        let mut st = self.lock_state();
        match &mut st.throttle {
            Throttle::Bucket(bucket) => bucket.reset(now),
            Throttle::Window(window) => window.reset(),
        }
        st.total_requests = 0;
        st.allowed_requests = 0;
        st.blocked_requests = 0;
        st.last_reset = now;
    }

    fn stats_locked(st: &LimiterState) -> RateLimiterStats {
        RateLimiterStats {
            total_requests: st.total_requests,
            allowed_requests: st.allowed_requests,
            blocked_requests: st.blocked_requests,
            since_reset_ms: st.last_reset.elapsed().as_millis() as u64,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
