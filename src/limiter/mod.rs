//! 限流器模块：令牌桶与滑动窗口两种策略的按名限流。
//!
//! # Rate Limiter Module
//!
//! Load shedding for outbound calls. Each named resource gets one
//! [`RateLimiter`] wrapping a single algorithm:
//!
//! | Strategy | Behavior |
//! |----------|----------|
//! | [`RateLimitStrategy::TokenBucket`] | long-run average rate with bursts up to a capacity |
//! | [`RateLimitStrategy::SlidingWindow`] | exact cap on requests in any trailing window |
//!
//! Both refill/prune lazily from a monotonic clock at call time; there are no
//! background timers. A rejected call fails fast with
//! [`RateLimitError::Limited`] and never starts the wrapped operation.
//!
//! ```rust
//! use breakwater::limiter::{RateLimiter, RateLimiterConfig, RateLimitStrategy};
//!
//! # async fn demo() {
//! let limiter = RateLimiter::new(
//!     "image-api",
//!     RateLimiterConfig::per_minute(30).with_strategy(RateLimitStrategy::SlidingWindow),
//! );
//!
//! let outcome = limiter
//!     .execute(|| async { render_image().await })
//!     .await;
//! # let _ = outcome;
//! # }
//! # async fn render_image() -> Result<Vec<u8>, std::io::Error> { Ok(vec![]) }
//! ```

mod config;
mod limiter;
mod registry;
mod sliding_window;
mod token_bucket;

pub use config::{RateLimitStrategy, RateLimiterConfig};
pub use limiter::{RateLimitError, RateLimiter, RateLimiterSnapshot, RateLimiterStats};
pub use registry::RateLimiterRegistry;
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;
