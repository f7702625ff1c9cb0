//! One guard per dependency: rate limiter in front, circuit breaker behind.
//!
//! Collaborators (LLM client, image client, search client, pooled connector,
//! UI-automation runner) hold a [`DependencyGuard`] and route every outbound
//! call through [`DependencyGuard::execute`]. Shedding happens before the
//! breaker is consulted, so a rate-limited call can never register as a
//! dependency failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::breaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerRegistry};
use crate::limiter::{RateLimitError, RateLimiter, RateLimiterRegistry};

/// Why a guarded call did not return the operation's own result.
#[derive(Debug, Error)]
pub enum GuardError<E> {
    /// Shed by the rate limiter; the operation was never invoked.
    #[error(
        "rate limit exceeded for '{name}': {limit} requests per {}ms, retry in {}ms",
        .window.as_millis(),
        .retry_after.as_millis()
    )]
    RateLimited {
        name: String,
        limit: u32,
        window: Duration,
        retry_after: Duration,
    },

    /// Rejected by an open circuit; the operation was never invoked.
    #[error("circuit breaker '{name}' is open, retry in {}ms", .retry_in.as_millis())]
    CircuitOpen { name: String, retry_in: Duration },

    /// The operation ran past the breaker's timeout and was dropped.
    #[error("operation on '{name}' timed out after {}ms", .elapsed.as_millis())]
    Timeout { name: String, elapsed: Duration },

    /// The operation ran and failed; its error passes through unchanged.
    #[error("{0}")]
    Inner(E),
}

impl<E> GuardError<E> {
    /// True when the call was never invoked (shed or circuit-rejected).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::CircuitOpen { .. })
    }

    /// How long the caller should wait before retrying, when the control
    /// plane knows.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            Self::CircuitOpen { retry_in, .. } => Some(*retry_in),
            _ => None,
        }
    }
}

impl<E> From<CircuitBreakerError<E>> for GuardError<E> {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::Open { name, retry_in } => Self::CircuitOpen { name, retry_in },
            CircuitBreakerError::Timeout { name, elapsed } => Self::Timeout { name, elapsed },
            CircuitBreakerError::Inner(e) => Self::Inner(e),
        }
    }
}

impl<E> From<RateLimitError<E>> for GuardError<E> {
    fn from(err: RateLimitError<E>) -> Self {
        match err {
            RateLimitError::Limited {
                name,
                limit,
                window,
                retry_after,
            } => Self::RateLimited {
                name,
                limit,
                window,
                retry_after,
            },
            RateLimitError::Inner(e) => Self::Inner(e),
        }
    }
}

/// The combined resilience wrapper for one named dependency.
pub struct DependencyGuard {
    name: String,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
}

impl DependencyGuard {
    pub fn new(
        name: impl Into<String>,
        limiter: Arc<RateLimiter>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            name: name.into(),
            limiter,
            breaker,
        }
    }

    /// Build a guard out of the two registries, sharing the named limiter and
    /// breaker with every other holder of the same name.
    pub fn from_registries(
        name: &str,
        limiters: &RateLimiterRegistry,
        breakers: &CircuitBreakerRegistry,
    ) -> Self {
        Self::new(name, limiters.get(name), breakers.get(name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Execute an operation under the limiter and the breaker.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, GuardError<E>>
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
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self
            .limiter
            .execute_weighted(|| self.breaker.execute(operation), cost)
            .await
        {
            Ok(value) => Ok(value),
            Err(RateLimitError::Inner(breaker_err)) => Err(breaker_err.into()),
            Err(RateLimitError::Limited {
                name,
                limit,
                window,
                retry_after,
            }) => Err(GuardError::RateLimited {
                name,
                limit,
                window,
                retry_after,
            }),
        }
    }
}
