//! # breakwater
//!
//! 弹性控制平面：为个人自动化助手的所有外部依赖调用提供熔断、限流与健康聚合。
//!
//! Resilience control plane for assistant services. Every outbound call to an
//! unreliable dependency — the LLM inference server, image and search APIs,
//! database and cache connections, UI-automation calls — passes through this
//! crate for failure isolation (circuit breaking), load shedding (rate
//! limiting), and aggregated health observability.
//!
//! ## Core Philosophy
//!
//! - **One contract**: collaborators call `execute(operation)` and get either
//!   the operation's own result or a typed rejection; native errors are never
//!   wrapped or swallowed
//! - **Injected state**: registries are constructed at startup and handed to
//!   collaborators — no global singletons, so tests get isolated instances
//! - **Lazy clocks**: token refill and window pruning happen at call time
//!   from a monotonic clock; there are no background timers on the hot path
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use breakwater::{
//!     CircuitBreakerRegistry, DependencyGuard, HealthMonitor, ProbeReport,
//!     RateLimiterRegistry,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let limiters = RateLimiterRegistry::new();
//! let breakers = Arc::new(CircuitBreakerRegistry::new());
//!
//! let llm = DependencyGuard::from_registries("llm-server", &limiters, &breakers);
//! let reply = llm
//!     .execute(|| async { request_completion("hello").await })
//!     .await;
//!
//! let monitor = Arc::new(HealthMonitor::new().with_breaker_registry(breakers.clone()));
//! monitor
//!     .register("llm-server", || async { Ok(ProbeReport::new("model loaded")) })
//!     .await;
//! let report = monitor.check_all().await;
//! # let _ = (reply, report);
//! # }
//! # async fn request_completion(_p: &str) -> Result<String, std::io::Error> { Ok(String::new()) }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`breaker`] | Three-state circuit breaker and its registry |
//! | [`limiter`] | Token-bucket and sliding-window rate limiting |
//! | [`guard`] | Combined per-dependency execute contract |
//! | [`health`] | Parallel health probes and aggregated reports |
//! | [`events`] | Breaker transition events and sinks |
//! | [`config`] | YAML/env settings resolved per dependency |

pub mod breaker;
pub mod config;
pub mod events;
pub mod guard;
pub mod health;
pub mod limiter;

// Re-export main types for convenience
pub use breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry,
    CircuitBreakerSnapshot, CircuitBreakerStats, CircuitState,
};
pub use config::ResilienceSettings;
pub use events::{
    BreakerEvent, BreakerEventSink, CompositeEventSink, InMemoryEventSink, NoopEventSink,
    TracingEventSink,
};
pub use guard::{DependencyGuard, GuardError};
pub use health::{
    CheckResult, CheckStatus, HealthMonitor, HealthProbe, HealthReport, HealthSummary,
    ProbeOptions, ProbeReport,
};
pub use limiter::{
    RateLimitError, RateLimitStrategy, RateLimiter, RateLimiterConfig, RateLimiterRegistry,
    RateLimiterSnapshot, RateLimiterStats,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
