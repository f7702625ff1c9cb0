//! End-to-end circuit breaker lifecycle: trip, fast-fail, probe, recover.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use breakwater::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry,
    CircuitState, InMemoryEventSink,
};

fn config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::new()
        .with_failure_threshold(3)
        .with_success_threshold(1)
        .with_timeout(Duration::from_millis(500))
        .with_reset_timeout(Duration::from_secs(1))
}

#[tokio::test]
async fn trip_fast_fail_then_recover() {
    let calls = Arc::new(AtomicU32::new(0));
    let breaker = CircuitBreaker::with_config("llm-server", config());

    // Three consecutive failures trip the circuit.
    for _ in 0..3 {
        let calls = calls.clone();
        let result = breaker
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("503 from upstream")
            })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::Inner(_))));
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // Fourth call is rejected without reaching the dependency.
    let result = {
        let calls = calls.clone();
        breaker
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &'static str>(())
            })
            .await
    };
    assert!(matches!(result, Err(CircuitBreakerError::Open { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // A rejection is not a failure.
    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.failure_count, 3);
    assert_eq!(snapshot.stats.rejected_requests, 1);

    // After the cooldown the next call actually runs, and with
    // success_threshold=1 a single success closes the circuit.
    tokio::time::sleep(Duration::from_millis(1050)).await;
    let result = {
        let calls = calls.clone();
        breaker
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &'static str>("recovered")
            })
            .await
    };
    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(breaker.is_healthy());
}

#[tokio::test]
async fn half_open_failure_reopens_immediately() {
    let breaker = CircuitBreaker::with_config(
        "image-api",
        config().with_reset_timeout(Duration::from_millis(50)),
    );
    for _ in 0..3 {
        let _ = breaker.execute(|| async { Err::<(), _>("down") }).await;
    }
    tokio::time::sleep(Duration::from_millis(60)).await;

    let _ = breaker.execute(|| async { Err::<(), _>("still down") }).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    // And the fresh open state rejects again.
    let result = breaker.execute(|| async { Ok::<_, &'static str>(()) }).await;
    assert!(matches!(result, Err(CircuitBreakerError::Open { .. })));
}

#[tokio::test]
async fn transitions_are_observable_through_the_registry_sink() {
    let sink = Arc::new(InMemoryEventSink::default());
    let registry = CircuitBreakerRegistry::with_config(
        config().with_reset_timeout(Duration::from_millis(40)),
    )
    .with_event_sink(sink.clone());

    let breaker = registry.get("search-api");
    for _ in 0..3 {
        let _ = breaker.execute(|| async { Err::<(), _>("timeout") }).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = breaker
        .execute(|| async { Ok::<_, &'static str>(()) })
        .await;

    let states: Vec<String> = sink
        .events_for("search-api")
        .into_iter()
        .filter_map(|event| match event {
            breakwater::BreakerEvent::StateChange { from, to, .. } => {
                Some(format!("{:?}->{:?}", from, to))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec!["Closed->Open", "Open->HalfOpen", "HalfOpen->Closed"]
    );
}

#[tokio::test]
async fn slow_operation_times_out_and_counts_against_the_breaker() {
    let breaker = CircuitBreaker::with_config(
        "ui-automation",
        CircuitBreakerConfig::new()
            .with_failure_threshold(2)
            .with_timeout(Duration::from_millis(30)),
    );

    for _ in 0..2 {
        let result: Result<(), CircuitBreakerError<&'static str>> = breaker
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::Timeout { .. })));
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.stats().failed_requests, 2);
}
