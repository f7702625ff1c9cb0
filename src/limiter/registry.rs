use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::config::RateLimiterConfig;
use super::limiter::{RateLimiter, RateLimiterSnapshot};

/// Get-or-create registry of rate limiters, keyed by resource name.
///
/// Mirrors [`crate::breaker::CircuitBreakerRegistry`]: one instance per name,
/// no removal, constructed at startup and injected into collaborators.
pub struct RateLimiterRegistry {
    limiters: RwLock<HashMap<String, Arc<RateLimiter>>>,
    default_config: RateLimiterConfig,
}

impl RateLimiterRegistry {
    /// Create a registry with default config for lazily created limiters.
    pub fn new() -> Self {
        Self::with_config(RateLimiterConfig::default())
    }

    /// Create a registry with a custom default config.
    pub fn with_config(config: RateLimiterConfig) -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
            default_config: config,
        }
    }

    /// Get or create the limiter for a resource, using the default config.
    pub fn get(&self, name: &str) -> Arc<RateLimiter> {
        self.get_with_config(name, self.default_config.clone())
    }

    /// Get or create with a specific config. The config only applies on first
    /// creation; an existing limiter keeps the config it was built with.
    pub fn get_with_config(&self, name: &str, config: RateLimiterConfig) -> Arc<RateLimiter> {
        if let Some(limiter) = self.read_map().get(name) {
            return limiter.clone();
        }
        let mut map = self
            .limiters
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(name.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::new(name, config)))
            .clone()
    }

    /// Names of all limiters created so far.
    pub fn names(&self) -> Vec<String> {
        self.read_map().keys().cloned().collect()
    }

    /// Snapshot every limiter.
    pub fn all_snapshots(&self) -> HashMap<String, RateLimiterSnapshot> {
        self.read_map()
            .iter()
            .map(|(name, limiter)| (name.clone(), limiter.snapshot()))
            .collect()
    }

    /// Restore capacity and zero counters on every limiter.
    pub fn reset_all(&self) {
        for limiter in self.read_map().values() {
            limiter.reset();
        }
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<RateLimiter>>> {
        self.limiters.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
