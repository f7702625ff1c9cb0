use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::probe::{FnProbe, HealthProbe, ProbeReport};
use super::report::{epoch_ms, CheckResult, CheckStatus, HealthReport, HealthSummary};
use crate::breaker::CircuitBreakerRegistry;
use crate::Result;

/// Per-check registration options.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Critical checks force the whole system unhealthy when they fail.
    pub critical: bool,
    /// Individual deadline for one probe run.
    pub timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            critical: true,
            timeout: Duration::from_secs(5),
        }
    }
}

impl ProbeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// A failing non-critical check degrades the system instead of failing it.
    pub fn non_critical() -> Self {
        Self::new().with_critical(false)
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

struct CheckEntry {
    probe: Arc<dyn HealthProbe>,
    options: ProbeOptions,
    consecutive_failures: u32,
    last_result: Option<CheckResult>,
    last_check: Option<Instant>,
}

/// Runs registered probes in parallel and folds their results into one
/// [`HealthReport`], optionally merging breaker state from a
/// [`CircuitBreakerRegistry`].
///
/// Probe failures never escape [`HealthMonitor::check_all`]; they surface in
/// the report and in the logs (`error` for critical checks, `warn`
/// otherwise).
pub struct HealthMonitor {
    checks: tokio::sync::RwLock<HashMap<String, CheckEntry>>,
    breakers: Option<Arc<CircuitBreakerRegistry>>,
    started: Instant,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            checks: tokio::sync::RwLock::new(HashMap::new()),
            breakers: None,
            started: Instant::now(),
            poller: Mutex::new(None),
        }
    }

    /// Fold this registry's breaker snapshots into every report.
    pub fn with_breaker_registry(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = Some(registry);
        self
    }

    /// Register a critical check with the default 5s timeout.
    pub async fn register<F, Fut>(&self, name: impl Into<String>, check_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ProbeReport>> + Send + 'static,
    {
        self.register_with(name, check_fn, ProbeOptions::default())
            .await;
    }

    /// Register a check with explicit options.
    pub async fn register_with<F, Fut>(
        &self,
        name: impl Into<String>,
        check_fn: F,
        options: ProbeOptions,
    ) where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ProbeReport>> + Send + 'static,
    {
        self.register_probe(name, Arc::new(FnProbe::new(check_fn)), options)
            .await;
    }

    /// Register a probe object. Re-registering a name replaces the probe and
    /// starts its failure count over.
    pub async fn register_probe(
        &self,
        name: impl Into<String>,
        probe: Arc<dyn HealthProbe>,
        options: ProbeOptions,
    ) {
        let mut checks = self.checks.write().await;
        checks.insert(
            name.into(),
            CheckEntry {
                probe,
                options,
                consecutive_failures: 0,
                last_result: None,
                last_check: None,
            },
        );
    }

    /// Names of all registered checks.
    pub async fn registered(&self) -> Vec<String> {
        self.checks.read().await.keys().cloned().collect()
    }

    /// Most recent result for one check, if it has run.
    pub async fn last_result(&self, name: &str) -> Option<CheckResult> {
        self.checks
            .read()
            .await
            .get(name)
            .and_then(|entry| entry.last_result.clone())
    }

    /// When one check last ran, if ever.
    pub async fn last_check(&self, name: &str) -> Option<Instant> {
        self.checks
            .read()
            .await
            .get(name)
            .and_then(|entry| entry.last_check)
    }

    /// Run every registered check concurrently and aggregate.
    pub async fn check_all(&self) -> HealthReport {
        let entries: Vec<(String, Arc<dyn HealthProbe>, ProbeOptions, u32)> = {
            let checks = self.checks.read().await;
            checks
                .iter()
                .map(|(name, entry)| {
                    (
                        name.clone(),
                        entry.probe.clone(),
                        entry.options.clone(),
                        entry.consecutive_failures,
                    )
                })
                .collect()
        };

        let runs = entries.into_iter().map(|(name, probe, options, prev_failures)| async move {
            let result = Self::run_probe(&name, probe, &options, prev_failures).await;
            (name, result)
        });
        let results: Vec<(String, CheckResult)> = futures::future::join_all(runs).await;

        // Write back bookkeeping before aggregating.
        {
            let now = Instant::now();
            let mut checks = self.checks.write().await;
            for (name, result) in &results {
                if let Some(entry) = checks.get_mut(name) {
                    entry.consecutive_failures = result.consecutive_failures;
                    entry.last_result = Some(result.clone());
                    entry.last_check = Some(now);
                }
            }
        }

        let mut overall = CheckStatus::Healthy;
        let mut summary = HealthSummary::default();
        for (_, result) in &results {
            summary.total += 1;
            match result.status {
                CheckStatus::Healthy => summary.healthy += 1,
                CheckStatus::Degraded => {
                    summary.degraded += 1;
                    if overall == CheckStatus::Healthy {
                        overall = CheckStatus::Degraded;
                    }
                }
                CheckStatus::Unhealthy => {
                    summary.unhealthy += 1;
                    if result.critical {
                        overall = CheckStatus::Unhealthy;
                    } else if overall == CheckStatus::Healthy {
                        overall = CheckStatus::Degraded;
                    }
                }
            }
        }

        HealthReport {
            status: overall,
            timestamp_ms: epoch_ms(),
            uptime_seconds: self.started.elapsed().as_secs_f64(),
            checks: results.into_iter().collect(),
            summary,
            circuit_breakers: self
                .breakers
                .as_ref()
                .map(|registry| registry.all_snapshots())
                .unwrap_or_default(),
        }
    }

    async fn run_probe(
        name: &str,
        probe: Arc<dyn HealthProbe>,
        options: &ProbeOptions,
        prev_failures: u32,
    ) -> CheckResult {
        let start = Instant::now();
        let outcome = tokio::time::timeout(options.timeout, probe.probe()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (status, message, details, error) = match outcome {
            Ok(Ok(report)) => (report.status, report.message, report.details, None),
            Ok(Err(err)) => {
                let text = err.to_string();
                (CheckStatus::Unhealthy, text.clone(), None, Some(text))
            }
            Err(_) => (
                CheckStatus::Unhealthy,
                format!("check timed out after {}ms", options.timeout.as_millis()),
                None,
                Some("timeout".to_string()),
            ),
        };

        let consecutive_failures = if status == CheckStatus::Unhealthy {
            prev_failures.saturating_add(1)
        } else {
            0
        };

        if status == CheckStatus::Unhealthy {
            if options.critical {
                tracing::error!(check = %name, %message, consecutive_failures, "critical health check failed");
            } else {
                tracing::warn!(check = %name, %message, consecutive_failures, "health check failed");
            }
        }

        CheckResult {
            status,
            message,
            details,
            duration_ms,
            error,
            consecutive_failures,
            critical: options.critical,
            timestamp_ms: epoch_ms(),
        }
    }

    /// Poll `check_all` on a fixed interval until [`HealthMonitor::stop`] is
    /// called or the monitor is dropped. Restarting replaces the previous
    /// poller.
    pub fn start_periodic(self: &Arc<Self>, every: Duration) {
        self.stop();
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(monitor) = weak.upgrade() else { break };
                let report = monitor.check_all().await;
                match report.status {
                    CheckStatus::Healthy => {
                        tracing::debug!(checks = report.summary.total, "periodic health check passed");
                    }
                    CheckStatus::Degraded => {
                        tracing::warn!(
                            degraded = report.summary.degraded,
                            unhealthy = report.summary.unhealthy,
                            "system degraded"
                        );
                    }
                    CheckStatus::Unhealthy => {
                        tracing::warn!(unhealthy = report.summary.unhealthy, "system unhealthy");
                    }
                }
            }
        });
        *self.lock_poller() = Some(handle);
    }

    /// Stop the periodic poller, if one is running.
    pub fn stop(&self) {
        if let Some(handle) = self.lock_poller().take() {
            handle.abort();
        }
    }

    /// Time since this monitor was constructed.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    fn lock_poller(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ok_probe() -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = Result<ProbeReport>> + Send>>
           + Send
           + Sync
           + 'static {
        || Box::pin(async { Ok(ProbeReport::new("ok")) })
    }

    #[tokio::test]
    async fn test_all_healthy() {
        let monitor = HealthMonitor::new();
        monitor.register("llm-server", ok_probe()).await;
        monitor.register("cache", ok_probe()).await;

        let report = monitor.check_all().await;
        assert_eq!(report.status, CheckStatus::Healthy);
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.healthy, 2);
        assert!(report.is_healthy());
    }

    #[tokio::test]
    async fn test_critical_failure_forces_unhealthy() {
        let monitor = HealthMonitor::new();
        monitor.register("llm-server", ok_probe()).await;
        monitor
            .register("db", || async { Err(Error::runtime("connection refused")) })
            .await;

        let report = monitor.check_all().await;
        assert_eq!(report.status, CheckStatus::Unhealthy);
        let db = &report.checks["db"];
        assert_eq!(db.status, CheckStatus::Unhealthy);
        assert!(db.error.as_ref().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_non_critical_failure_only_degrades() {
        let monitor = HealthMonitor::new();
        monitor.register("llm-server", ok_probe()).await;
        monitor
            .register_with(
                "cache",
                || async { Err(Error::runtime("cache cold")) },
                ProbeOptions::non_critical(),
            )
            .await;

        let report = monitor.check_all().await;
        assert_eq!(report.status, CheckStatus::Degraded);
        assert_eq!(report.summary.unhealthy, 1);
    }

    #[tokio::test]
    async fn test_two_failures_critical_and_not() {
        let monitor = HealthMonitor::new();
        monitor
            .register("db", || async { Err(Error::runtime("down")) })
            .await;
        monitor
            .register_with(
                "cache",
                || async { Err(Error::runtime("down")) },
                ProbeOptions::non_critical(),
            )
            .await;

        let report = monitor.check_all().await;
        assert_eq!(report.status, CheckStatus::Unhealthy);
        assert_eq!(report.summary.unhealthy, 2);
    }

    #[tokio::test]
    async fn test_degraded_probe_downgrades() {
        let monitor = HealthMonitor::new();
        monitor.register("llm-server", ok_probe()).await;
        monitor
            .register("search-api", || async {
                Ok(ProbeReport::degraded("slow upstream"))
            })
            .await;

        let report = monitor.check_all().await;
        assert_eq!(report.status, CheckStatus::Degraded);
        assert_eq!(report.summary.degraded, 1);
    }

    #[tokio::test]
    async fn test_probe_timeout_reported_not_hung() {
        let monitor = HealthMonitor::new();
        monitor
            .register_with(
                "slow",
                || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(ProbeReport::new("never"))
                },
                ProbeOptions::new().with_timeout(Duration::from_millis(50)),
            )
            .await;

        let started = Instant::now();
        let report = monitor.check_all().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        let check = &report.checks["slow"];
        assert_eq!(check.status, CheckStatus::Unhealthy);
        assert_eq!(check.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_consecutive_failures_accumulate_and_reset() {
        let healthy = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = healthy.clone();
        let monitor = HealthMonitor::new();
        monitor
            .register("flappy", move || {
                let flag = flag.clone();
                async move {
                    if flag.load(Ordering::SeqCst) {
                        Ok(ProbeReport::new("recovered"))
                    } else {
                        Err(Error::runtime("flapping"))
                    }
                }
            })
            .await;

        monitor.check_all().await;
        let report = monitor.check_all().await;
        assert_eq!(report.checks["flappy"].consecutive_failures, 2);

        healthy.store(true, Ordering::SeqCst);
        let report = monitor.check_all().await;
        assert_eq!(report.checks["flappy"].consecutive_failures, 0);
        assert_eq!(monitor.last_result("flappy").await.unwrap().status, CheckStatus::Healthy);
    }

    #[tokio::test]
    async fn test_breaker_snapshots_merged_without_flipping_status() {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        registry.get("image-api").force_open();

        let monitor = HealthMonitor::new().with_breaker_registry(registry);
        monitor.register("llm-server", ok_probe()).await;

        let report = monitor.check_all().await;
        assert_eq!(report.status, CheckStatus::Healthy);
        assert!(!report.circuit_breakers["image-api"].is_healthy());
    }

    #[tokio::test]
    async fn test_periodic_polling_runs_and_stops() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let monitor = Arc::new(HealthMonitor::new());
        monitor
            .register("tick", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(ProbeReport::new("ok"))
                }
            })
            .await;

        monitor.start_periodic(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(120)).await;
        monitor.stop();
        // Let any in-flight poll settle before sampling the counter.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "expected several polls, got {after_stop}");
        assert!(monitor.last_check("tick").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }
}
