use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;

use super::report::CheckStatus;
use crate::Result;

/// What a probe reports when it completes. Throwing (returning `Err`) marks
/// the check unhealthy; a returned report is healthy unless it says otherwise.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub status: CheckStatus,
    pub message: String,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

impl ProbeReport {
    /// A healthy report with a short message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Healthy,
            message: message.into(),
            details: None,
        }
    }

    /// The dependency answers but below expectations.
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Degraded,
            message: message.into(),
            details: None,
        }
    }

    /// Attach a key/value detail for the report consumer.
    pub fn with_detail(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// An async health probe for one dependency.
///
/// Implement this directly for probes with state (connection pools, cached
/// clients); plain async closures are adapted automatically by
/// [`super::HealthMonitor::register`].
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<ProbeReport>;
}

/// Adapter turning an async closure into a [`HealthProbe`].
pub(super) struct FnProbe<F> {
    check_fn: F,
}

impl<F> FnProbe<F> {
    pub(super) fn new(check_fn: F) -> Self {
        Self { check_fn }
    }
}

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProbeReport>> + Send,
{
    async fn probe(&self) -> Result<ProbeReport> {
        (self.check_fn)().await
    }
}
