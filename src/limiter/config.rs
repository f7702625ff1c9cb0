use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which algorithm a [`super::RateLimiter`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitStrategy {
    /// Average rate with burst capacity; cheap, approximate at window edges.
    TokenBucket,
    /// Exact cap on requests in any trailing window; stores one timestamp
    /// per admitted request.
    SlidingWindow,
}

/// Configuration for a single named rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub strategy: RateLimitStrategy,
    /// Requests allowed per `window`.
    pub max_requests: u32,
    pub window: Duration,
    /// Token-bucket capacity override; defaults to `max_requests`.
    pub burst_limit: Option<u32>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            strategy: RateLimitStrategy::TokenBucket,
            max_requests: 60,
            window: Duration::from_secs(60),
            burst_limit: None,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// `n` requests per minute.
    pub fn per_minute(n: u32) -> Self {
        Self::new().with_max_requests(n).with_window(Duration::from_secs(60))
    }

    /// `n` requests per second.
    pub fn per_second(n: u32) -> Self {
        Self::new().with_max_requests(n).with_window(Duration::from_secs(1))
    }

    /// Select the limiting algorithm
    pub fn with_strategy(mut self, strategy: RateLimitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the per-window request budget
    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Set the window length
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the burst capacity (token bucket only)
    pub fn with_burst_limit(mut self, burst_limit: u32) -> Self {
        self.burst_limit = Some(burst_limit);
        self
    }

    /// Token-bucket refill rate: tokens per one-second interval.
    pub fn refill_rate(&self) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.max_requests as f64 / secs
        }
    }

    /// Token-bucket capacity.
    pub fn capacity(&self) -> f64 {
        self.burst_limit.unwrap_or(self.max_requests) as f64
    }
}
