use std::collections::HashMap;

use serde::Serialize;

use crate::breaker::CircuitBreakerSnapshot;

/// Severity of one check, or of the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Outcome of one probe run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
    /// How long the probe took (or how long it was allowed to take, on timeout).
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub consecutive_failures: u32,
    pub critical: bool,
    /// Wall-clock completion time, epoch milliseconds.
    pub timestamp_ms: u64,
}

/// Per-status counts over all checks in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub total: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
}

/// Aggregated view of the whole system, as returned by
/// [`super::HealthMonitor::check_all`] and consumed by the monitoring
/// endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: CheckStatus,
    /// Wall-clock report time, epoch milliseconds.
    pub timestamp_ms: u64,
    pub uptime_seconds: f64,
    pub checks: HashMap<String, CheckResult>,
    pub summary: HealthSummary,
    /// Breaker states folded in for observability; they do not affect
    /// `status` unless a registered check inspects them.
    pub circuit_breakers: HashMap<String, CircuitBreakerSnapshot>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == CheckStatus::Healthy
    }
}

pub(super) fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
