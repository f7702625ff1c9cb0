//! # Health Check Module
//!
//! Aggregated health observability for every dependency the assistant talks
//! to. Collaborators register an async probe per dependency; the
//! [`HealthMonitor`] runs them all in parallel, bounds each with its own
//! timeout, and folds the results into a single [`HealthReport`] together
//! with the current circuit-breaker snapshots.
//!
//! Aggregation: one failing *critical* check makes the whole system
//! `unhealthy`; failing non-critical checks (and explicit `degraded` reports)
//! only downgrade it to `degraded`.
//!
//! ```rust
//! use breakwater::health::{HealthMonitor, ProbeOptions, ProbeReport};
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let monitor = HealthMonitor::new();
//! monitor
//!     .register("llm-server", || async {
//!         Ok(ProbeReport::new("model loaded").with_detail("model", "llama-3.2-3b"))
//!     })
//!     .await;
//! monitor
//!     .register_with(
//!         "cache",
//!         || async { Ok(ProbeReport::new("warm")) },
//!         ProbeOptions::non_critical().with_timeout(Duration::from_secs(1)),
//!     )
//!     .await;
//!
//! let report = monitor.check_all().await;
//! # let _ = report;
//! # }
//! ```

mod monitor;
mod probe;
mod report;

pub use monitor::{HealthMonitor, ProbeOptions};
pub use probe::{HealthProbe, ProbeReport};
pub use report::{CheckResult, CheckStatus, HealthReport, HealthSummary};
