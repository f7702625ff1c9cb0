use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use super::config::CircuitBreakerConfig;
use crate::events::{BreakerEvent, BreakerEventSink, TracingEventSink};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Operations proceed normally.
    Closed,
    /// Operations are rejected without executing.
    Open,
    /// Trial operations allowed to test recovery.
    HalfOpen,
}

/// Why an `execute` call did not return the operation's own result.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the operation was never invoked.
    #[error("circuit breaker '{name}' is open, retry in {}ms", .retry_in.as_millis())]
    Open { name: String, retry_in: Duration },

    /// The operation exceeded the configured timeout and was dropped.
    #[error("operation on '{name}' timed out after {}ms", .elapsed.as_millis())]
    Timeout { name: String, elapsed: Duration },

    /// The operation ran and failed; its error passes through unchanged.
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// True when the breaker rejected the call without running it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Cumulative counters for one breaker.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CircuitBreakerStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    /// Milliseconds since the most recent failure, if any.
    pub last_failure_ms_ago: Option<u64>,
    /// Milliseconds since the most recent success, if any.
    pub last_success_ms_ago: Option<u64>,
}

impl CircuitBreakerStats {
    /// Failure rate over executed (non-rejected) requests, as a percentage.
    pub fn failure_rate(&self) -> f64 {
        let executed = self.successful_requests + self.failed_requests;
        if executed == 0 {
            0.0
        } else {
            (self.failed_requests as f64 / executed as f64) * 100.0
        }
    }
}

/// Point-in-time view of a breaker, cheap to clone and serialize.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    /// Remaining open time in ms, if currently open and inside the cooldown.
    pub open_remaining_ms: Option<u64>,
    pub stats: CircuitBreakerStats,
}

impl CircuitBreakerSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.state == CircuitState::Closed
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    next_attempt: Option<Instant>,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    rejected_requests: u64,
    last_failure: Option<Instant>,
    last_success: Option<Instant>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            next_attempt: None,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            rejected_requests: 0,
            last_failure: None,
            last_success: None,
        }
    }
}

/// Three-state circuit breaker guarding one named dependency.
///
/// All state checks are synchronous; the wrapped operation is the only point
/// at which [`CircuitBreaker::execute`] suspends. Safe to share behind an
/// `Arc` across many in-flight calls.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    sink: Arc<dyn BreakerEventSink>,
}

impl CircuitBreaker {
    /// Create a breaker with default config, logging transitions via `tracing`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Create a breaker with custom config.
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::new()),
            sink: Arc::new(TracingEventSink),
        }
    }

    /// Replace the transition sink (builder style, before sharing the breaker).
    pub fn with_event_sink(mut self, sink: Arc<dyn BreakerEventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an operation under this breaker.
    ///
    /// Rejected calls (`CircuitBreakerError::Open`) never invoke the
    /// operation and never count as failures. Timeouts count as failures and
    /// drop the operation future.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit()?;

        match tokio::time::timeout(self.config.timeout, operation()).await {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure();
                Err(CircuitBreakerError::Inner(err))
            }
            Err(_) => {
                self.record_failure();
                Err(CircuitBreakerError::Timeout {
                    name: self.name.clone(),
                    elapsed: self.config.timeout,
                })
            }
        }
    }

    /// Gate keeping for `execute`: reject while open, flip to half-open once
    /// the cooldown has elapsed.
    fn admit<E>(&self) -> Result<(), CircuitBreakerError<E>> {
        let mut events = Vec::new();
        {
            let mut st = self.lock_state();
            st.total_requests += 1;

            if st.state == CircuitState::Open {
                let now = Instant::now();
                match st.next_attempt {
                    Some(at) if now < at => {
                        st.rejected_requests += 1;
                        return Err(CircuitBreakerError::Open {
                            name: self.name.clone(),
                            retry_in: at - now,
                        });
                    }
                    _ => {
                        st.state = CircuitState::HalfOpen;
                        st.success_count = 0;
                        events.push(BreakerEvent::StateChange {
                            name: self.name.clone(),
                            from: CircuitState::Open,
                            to: CircuitState::HalfOpen,
                        });
                        events.push(BreakerEvent::HalfOpened {
                            name: self.name.clone(),
                        });
                    }
                }
            }
        }
        self.emit(events);
        Ok(())
    }

    /// Record a successful operation outcome.
    pub fn record_success(&self) {
        let mut events = Vec::new();
        {
            let mut st = self.lock_state();
            st.successful_requests += 1;
            st.last_success = Some(Instant::now());
            st.failure_count = 0;

            if st.state == CircuitState::HalfOpen {
                st.success_count += 1;
                if st.success_count >= self.config.success_threshold {
                    self.close_locked(&mut st, &mut events);
                }
            }
        }
        self.emit(events);
    }

    /// Record a failed operation outcome.
    pub fn record_failure(&self) {
        let mut events = Vec::new();
        {
            let mut st = self.lock_state();
            st.failed_requests += 1;
            st.last_failure = Some(Instant::now());
            st.failure_count = st.failure_count.saturating_add(1);
            st.success_count = 0;

            // Any failure during a half-open probe reopens immediately.
            let should_open = st.state == CircuitState::HalfOpen
                || (st.state == CircuitState::Closed
                    && st.failure_count >= self.config.failure_threshold);
            if should_open {
                self.open_locked(&mut st, &mut events);
            }
        }
        self.emit(events);
    }

    /// Manually trip the breaker open, starting a fresh cooldown.
    pub fn force_open(&self) {
        let mut events = Vec::new();
        {
            let mut st = self.lock_state();
            self.open_locked(&mut st, &mut events);
        }
        self.emit(events);
    }

    /// Manually close the breaker, clearing transition counters.
    pub fn force_close(&self) {
        let mut events = Vec::new();
        {
            let mut st = self.lock_state();
            self.close_locked(&mut st, &mut events);
        }
        self.emit(events);
    }

    /// Force closed and zero every statistic.
    pub fn reset(&self) {
        let mut events = Vec::new();
        {
            let mut st = self.lock_state();
            self.close_locked(&mut st, &mut events);
            *st = BreakerState::new();
        }
        self.emit(events);
    }

    pub fn state(&self) -> CircuitState {
        self.lock_state().state
    }

    pub fn is_healthy(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let st = self.lock_state();
        Self::stats_locked(&st)
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let st = self.lock_state();
        let now = Instant::now();
        let open_remaining_ms = match (st.state, st.next_attempt) {
            (CircuitState::Open, Some(at)) if at > now => Some((at - now).as_millis() as u64),
            _ => None,
        };
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: st.state,
            failure_count: st.failure_count,
            success_count: st.success_count,
            failure_threshold: self.config.failure_threshold,
            success_threshold: self.config.success_threshold,
            open_remaining_ms,
            stats: Self::stats_locked(&st),
        }
    }

    fn stats_locked(st: &BreakerState) -> CircuitBreakerStats {
        let now = Instant::now();
        let ms_ago = |t: Option<Instant>| t.map(|t| now.saturating_duration_since(t).as_millis() as u64);
        CircuitBreakerStats {
            total_requests: st.total_requests,
            successful_requests: st.successful_requests,
            failed_requests: st.failed_requests,
            rejected_requests: st.rejected_requests,
            last_failure_ms_ago: ms_ago(st.last_failure),
            last_success_ms_ago: ms_ago(st.last_success),
        }
    }

    fn open_locked(&self, st: &mut BreakerState, events: &mut Vec<BreakerEvent>) {
        if st.state != CircuitState::Open {
            events.push(BreakerEvent::StateChange {
                name: self.name.clone(),
                from: st.state,
                to: CircuitState::Open,
            });
            events.push(BreakerEvent::Opened {
                name: self.name.clone(),
            });
        }
        st.state = CircuitState::Open;
        st.next_attempt = Some(Instant::now() + self.config.reset_timeout);
        st.success_count = 0;
    }

    fn close_locked(&self, st: &mut BreakerState, events: &mut Vec<BreakerEvent>) {
        if st.state != CircuitState::Closed {
            events.push(BreakerEvent::StateChange {
                name: self.name.clone(),
                from: st.state,
                to: CircuitState::Closed,
            });
            events.push(BreakerEvent::Closed {
                name: self.name.clone(),
            });
        }
        st.state = CircuitState::Closed;
        st.failure_count = 0;
        st.success_count = 0;
        st.next_attempt = None;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        // A panic while holding the lock leaves counters valid, so poisoning
        // is recoverable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, events: Vec<BreakerEvent>) {
        for event in &events {
            self.sink.on_event(event);
        }
    }
}
