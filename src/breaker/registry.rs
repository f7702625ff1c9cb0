use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::breaker::{CircuitBreaker, CircuitBreakerSnapshot};
use super::config::CircuitBreakerConfig;
use crate::events::{BreakerEventSink, TracingEventSink};

/// Get-or-create registry of circuit breakers, keyed by dependency name.
///
/// A name maps to exactly one breaker for the registry's lifetime; there is
/// no removal. Construct one registry at startup and hand it to collaborators
/// rather than sharing process-wide state.
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
    sink: Arc<dyn BreakerEventSink>,
}

impl CircuitBreakerRegistry {
    /// Create a registry with default config for lazily created breakers.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a registry with a custom default config.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config: config,
            sink: Arc::new(TracingEventSink),
        }
    }

    /// Sink handed to every breaker this registry creates.
    pub fn with_event_sink(mut self, sink: Arc<dyn BreakerEventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Get or create the breaker for a dependency, using the default config.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_with_config(name, self.default_config.clone())
    }

    /// Get or create with a specific config. The config only applies on first
    /// creation; an existing breaker keeps the config it was built with.
    pub fn get_with_config(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.read_map().get(name) {
            return breaker.clone();
        }
        let mut map = self
            .breakers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(
                    CircuitBreaker::with_config(name, config).with_event_sink(self.sink.clone()),
                )
            })
            .clone()
    }

    /// Names of all breakers created so far.
    pub fn names(&self) -> Vec<String> {
        self.read_map().keys().cloned().collect()
    }

    /// Snapshot every breaker, for health reports and monitoring endpoints.
    pub fn all_snapshots(&self) -> HashMap<String, CircuitBreakerSnapshot> {
        self.read_map()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.snapshot()))
            .collect()
    }

    /// Force-close and zero every breaker.
    pub fn reset_all(&self) {
        for breaker in self.read_map().values() {
            breaker.reset();
        }
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<CircuitBreaker>>> {
        self.breakers.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
