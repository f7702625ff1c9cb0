//! Resilience Tour
//!
//! Walks through the three layers of the control plane the way the assistant
//! wires them at startup:
//! - Circuit breaker tripping and recovering against a flaky dependency
//! - Rate limiter shedding a burst
//! - Health monitor aggregating probes and breaker state
//!
//! Usage:
//!   cargo run --example resilience_tour

use std::sync::Arc;
use std::time::Duration;

use breakwater::{
    CircuitBreakerConfig, CircuitBreakerRegistry, DependencyGuard, GuardError, HealthMonitor,
    ProbeOptions, ProbeReport, RateLimitStrategy, RateLimiterConfig, RateLimiterRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Breakwater Resilience Tour ===\n");

    let limiters = RateLimiterRegistry::with_config(
        RateLimiterConfig::per_second(5).with_strategy(RateLimitStrategy::SlidingWindow),
    );
    let breakers = Arc::new(CircuitBreakerRegistry::with_config(
        CircuitBreakerConfig::new()
            .with_failure_threshold(3)
            .with_success_threshold(1)
            .with_reset_timeout(Duration::from_millis(500)),
    ));

    demo_breaker(&limiters, &breakers).await;
    demo_limiter(&limiters, &breakers).await;
    demo_health(breakers.clone()).await?;

    Ok(())
}

async fn demo_breaker(limiters: &RateLimiterRegistry, breakers: &Arc<CircuitBreakerRegistry>) {
    println!("--- 1. Circuit breaker against a flaky LLM server ---\n");
    let guard = DependencyGuard::from_registries("llm-server", limiters, breakers);

    for attempt in 1..=5 {
        let result = guard
            .execute(|| async { Err::<String, _>("connection refused") })
            .await;
        match result {
            Err(GuardError::Inner(e)) => println!("attempt {attempt}: upstream error: {e}"),
            Err(GuardError::CircuitOpen { retry_in, .. }) => {
                println!(
                    "attempt {attempt}: FAST-FAILED, circuit open ({}ms until probe)",
                    retry_in.as_millis()
                )
            }
            other => println!("attempt {attempt}: {other:?}"),
        }
    }

    // Sit out both the breaker cooldown and the limiter window.
    println!("\nwaiting out the cooldown...");
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let result = guard
        .execute(|| async { Ok::<_, &'static str>("pong") })
        .await;
    println!("probe after cooldown: {result:?}");
    println!("breaker healthy again: {}\n", guard.breaker().is_healthy());
}

async fn demo_limiter(limiters: &RateLimiterRegistry, breakers: &Arc<CircuitBreakerRegistry>) {
    println!("--- 2. Rate limiter shedding a burst (5/sec) ---\n");
    let guard = DependencyGuard::from_registries("image-api", limiters, breakers);

    for request in 1..=8 {
        let result = guard
            .execute(|| async { Ok::<_, &'static str>("image bytes") })
            .await;
        match result {
            Ok(_) => println!("request {request}: allowed"),
            Err(GuardError::RateLimited { retry_after, .. }) => println!(
                "request {request}: SHED, retry in {}ms",
                retry_after.as_millis()
            ),
            Err(other) => println!("request {request}: {other}"),
        }
    }
    println!();
}

async fn demo_health(breakers: Arc<CircuitBreakerRegistry>) -> anyhow::Result<()> {
    println!("--- 3. Health monitor ---\n");
    let monitor = Arc::new(HealthMonitor::new().with_breaker_registry(breakers));

    monitor
        .register("llm-server", || async {
            Ok(ProbeReport::new("model loaded").with_detail("model", "llama-3.2-3b"))
        })
        .await;
    monitor
        .register_with(
            "search-api",
            || async { Ok(ProbeReport::degraded("elevated latency")) },
            ProbeOptions::non_critical().with_timeout(Duration::from_secs(2)),
        )
        .await;

    let report = monitor.check_all().await;
    println!("overall: {:?}", report.status);
    println!(
        "summary: {} checks, {} healthy, {} degraded, {} unhealthy",
        report.summary.total,
        report.summary.healthy,
        report.summary.degraded,
        report.summary.unhealthy
    );
    println!("\nfull report as the monitoring endpoint sees it:");
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
