//! The single contract collaborators consume: registries + guard + settings.

use std::sync::Arc;
use std::time::Duration;

use breakwater::{
    CircuitBreakerRegistry, DependencyGuard, GuardError, RateLimiterRegistry,
    ResilienceSettings,
};

const SETTINGS: &str = r#"
defaults:
  breaker:
    failure_threshold: 2
    success_threshold: 1
    timeout_ms: 200
    reset_timeout_ms: 100
  limiter:
    strategy: sliding-window
    max_requests: 3
    window_ms: 60000
dependencies:
  image-api:
    limiter:
      strategy: sliding-window
      max_requests: 1
      window_ms: 60000
  llm-server:
    limiter:
      strategy: sliding-window
      max_requests: 10
      window_ms: 60000
"#;

#[derive(Debug, PartialEq)]
struct UpstreamError(&'static str);

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream: {}", self.0)
    }
}

fn wired() -> (RateLimiterRegistry, Arc<CircuitBreakerRegistry>) {
    let settings = ResilienceSettings::from_yaml_str(SETTINGS).unwrap();
    (
        settings.limiter_registry(),
        Arc::new(settings.breaker_registry()),
    )
}

#[tokio::test]
async fn happy_path_returns_the_operations_value() {
    let (limiters, breakers) = wired();
    let guard = DependencyGuard::from_registries("llm-server", &limiters, &breakers);

    let reply = guard
        .execute(|| async { Ok::<_, UpstreamError>("42 tokens generated") })
        .await
        .unwrap();
    assert_eq!(reply, "42 tokens generated");
}

#[tokio::test]
async fn native_errors_pass_through_unchanged() {
    let (limiters, breakers) = wired();
    let guard = DependencyGuard::from_registries("llm-server", &limiters, &breakers);

    let err = guard
        .execute(|| async { Err::<(), _>(UpstreamError("model not loaded")) })
        .await
        .unwrap_err();
    match err {
        GuardError::Inner(inner) => assert_eq!(inner, UpstreamError("model not loaded")),
        other => panic!("expected Inner, got {other:?}"),
    }
}

#[tokio::test]
async fn shed_calls_do_not_feed_the_breaker() {
    let (limiters, breakers) = wired();
    let guard = DependencyGuard::from_registries("image-api", &limiters, &breakers);

    assert!(guard
        .execute(|| async { Ok::<_, UpstreamError>(()) })
        .await
        .is_ok());

    // The per-dependency override allows a single request per window.
    let err = guard
        .execute(|| async { Ok::<_, UpstreamError>(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, GuardError::RateLimited { limit: 1, .. }));
    assert!(err.is_rejection());

    let breaker_stats = breakers.get("image-api").stats();
    assert_eq!(breaker_stats.total_requests, 1);
    assert_eq!(breaker_stats.failed_requests, 0);
}

#[tokio::test]
async fn tripped_dependency_fast_fails_then_recovers() {
    let (limiters, breakers) = wired();
    let guard = DependencyGuard::from_registries("llm-server", &limiters, &breakers);

    for _ in 0..2 {
        let _ = guard
            .execute(|| async { Err::<(), _>(UpstreamError("500")) })
            .await;
    }

    let err = guard
        .execute(|| async { Ok::<_, UpstreamError>(()) })
        .await
        .unwrap_err();
    match &err {
        GuardError::CircuitOpen { name, .. } => assert_eq!(name, "llm-server"),
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
    assert!(err.retry_after().unwrap() <= Duration::from_millis(100));

    // Cooldown passes; the llm-server window still has budget, so the probe
    // call goes through and closes the circuit.
    tokio::time::sleep(Duration::from_millis(120)).await;
    let reply = guard
        .execute(|| async { Ok::<_, UpstreamError>("back") })
        .await
        .unwrap();
    assert_eq!(reply, "back");
    assert!(breakers.get("llm-server").is_healthy());
}

#[tokio::test]
async fn guards_for_the_same_name_share_state() {
    let (limiters, breakers) = wired();
    let from_llm_client = DependencyGuard::from_registries("search-api", &limiters, &breakers);
    let from_scheduler = DependencyGuard::from_registries("search-api", &limiters, &breakers);

    // Exhaust the shared window budget (3) across both guards.
    for guard in [&from_llm_client, &from_scheduler, &from_llm_client] {
        assert!(guard
            .execute(|| async { Ok::<_, UpstreamError>(()) })
            .await
            .is_ok());
    }
    let err = from_scheduler
        .execute(|| async { Ok::<_, UpstreamError>(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, GuardError::RateLimited { .. }));
}
