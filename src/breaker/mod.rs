//! 熔断器模块：隔离持续失败的依赖，冷却后自动试探恢复。
//!
//! # Circuit Breaker Module
//!
//! Failure isolation for unreliable dependencies. A breaker wraps every call
//! to one named dependency and stops forwarding work once consecutive
//! failures cross a threshold, then probes for recovery after a cooldown.
//!
//! - **Closed**: normal operation, requests pass through
//! - **Open**: failures exceeded the threshold, requests fail fast
//! - **Half-Open**: trial requests test whether the dependency recovered
//!
//! ```rust
//! use breakwater::breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let breaker = CircuitBreaker::with_config(
//!     "llm-server",
//!     CircuitBreakerConfig::new()
//!         .with_failure_threshold(5)
//!         .with_reset_timeout(Duration::from_secs(30)),
//! );
//!
//! let reply = breaker
//!     .execute(|| async { fetch_completion().await })
//!     .await;
//! # let _ = reply;
//! # }
//! # async fn fetch_completion() -> Result<String, std::io::Error> { Ok(String::new()) }
//! ```
//!
//! Registries hand out one shared breaker per dependency name; see
//! [`CircuitBreakerRegistry`].

mod breaker;
mod config;
mod registry;

pub use breaker::{
    CircuitBreaker, CircuitBreakerError, CircuitBreakerSnapshot, CircuitBreakerStats, CircuitState,
};
pub use config::CircuitBreakerConfig;
pub use registry::CircuitBreakerRegistry;
