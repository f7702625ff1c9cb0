//! Resilience settings: per-dependency breaker/limiter configuration.
//!
//! Settings load from YAML and/or `BREAKWATER_*` environment variables and
//! resolve into [`CircuitBreakerConfig`]/[`RateLimiterConfig`] values per
//! dependency name, falling back to the `defaults` section.
//!
//! ```yaml
//! defaults:
//!   breaker:
//!     failure_threshold: 5
//!     reset_timeout_ms: 30000
//!   limiter:
//!     strategy: token-bucket
//!     max_requests: 60
//!     window_ms: 60000
//! dependencies:
//!   llm-server:
//!     limiter:
//!       strategy: sliding-window
//!       max_requests: 20
//!       window_ms: 10000
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::limiter::{RateLimitStrategy, RateLimiterConfig, RateLimiterRegistry};
use crate::{Error, ErrorContext, Result};

fn default_failure_threshold() -> u32 {
    5
}
fn default_success_threshold() -> u32 {
    2
}
fn default_timeout_ms() -> u64 {
    60_000
}
fn default_reset_timeout_ms() -> u64 {
    30_000
}
fn default_strategy() -> RateLimitStrategy {
    RateLimitStrategy::TokenBucket
}
fn default_max_requests() -> u32 {
    60
}
fn default_window_ms() -> u64 {
    60_000
}

/// Breaker section of a dependency's settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_ms: default_timeout_ms(),
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

impl BreakerSettings {
    pub fn to_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.failure_threshold)
            .with_success_threshold(self.success_threshold)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_reset_timeout(Duration::from_millis(self.reset_timeout_ms))
    }
}

/// Limiter section of a dependency's settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSettings {
    #[serde(default = "default_strategy")]
    pub strategy: RateLimitStrategy,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst_limit: Option<u32>,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            burst_limit: None,
        }
    }
}

impl LimiterSettings {
    pub fn to_config(&self) -> RateLimiterConfig {
        let mut config = RateLimiterConfig::new()
            .with_strategy(self.strategy)
            .with_max_requests(self.max_requests)
            .with_window(Duration::from_millis(self.window_ms));
        if let Some(burst) = self.burst_limit {
            config = config.with_burst_limit(burst);
        }
        config
    }
}

/// Settings for one named dependency. Missing sections inherit the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaker: Option<BreakerSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limiter: Option<LimiterSettings>,
}

/// The whole settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceSettings {
    #[serde(default)]
    pub defaults: DependencySettings,
    #[serde(default)]
    pub dependencies: HashMap<String, DependencySettings>,
}

impl ResilienceSettings {
    /// Parse and validate settings from a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Apply `BREAKWATER_*` environment overrides to the defaults section.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        let breaker = self.defaults.breaker.get_or_insert_with(Default::default);
        if let Some(v) = env_u32("BREAKWATER_FAILURE_THRESHOLD")? {
            breaker.failure_threshold = v;
        }
        if let Some(v) = env_u32("BREAKWATER_SUCCESS_THRESHOLD")? {
            breaker.success_threshold = v;
        }
        if let Some(v) = env_u64("BREAKWATER_TIMEOUT_MS")? {
            breaker.timeout_ms = v;
        }
        if let Some(v) = env_u64("BREAKWATER_RESET_TIMEOUT_MS")? {
            breaker.reset_timeout_ms = v;
        }

        let limiter = self.defaults.limiter.get_or_insert_with(Default::default);
        if let Some(v) = env_u32("BREAKWATER_MAX_REQUESTS")? {
            limiter.max_requests = v;
        }
        if let Some(v) = env_u64("BREAKWATER_WINDOW_MS")? {
            limiter.window_ms = v;
        }
        if let Some(v) = env_u32("BREAKWATER_BURST_LIMIT")? {
            limiter.burst_limit = Some(v);
        }
        if let Some(raw) = env_string("BREAKWATER_STRATEGY") {
            limiter.strategy = match raw.as_str() {
                "token-bucket" => RateLimitStrategy::TokenBucket,
                "sliding-window" => RateLimitStrategy::SlidingWindow,
                other => {
                    return Err(Error::configuration_with_context(
                        format!("unknown strategy '{other}'"),
                        ErrorContext::new()
                            .with_field_path("BREAKWATER_STRATEGY")
                            .with_source("settings_loader"),
                    ));
                }
            };
        }

        self.validate()?;
        Ok(self)
    }

    /// Check thresholds and windows are usable.
    pub fn validate(&self) -> Result<()> {
        let sections = std::iter::once(("defaults", &self.defaults)).chain(
            self.dependencies
                .iter()
                .map(|(name, dep)| (name.as_str(), dep)),
        );
        for (name, dep) in sections {
            if let Some(breaker) = &dep.breaker {
                if breaker.failure_threshold == 0 {
                    return Err(invalid(name, "breaker.failure_threshold", "must be at least 1"));
                }
                if breaker.success_threshold == 0 {
                    return Err(invalid(name, "breaker.success_threshold", "must be at least 1"));
                }
            }
            if let Some(limiter) = &dep.limiter {
                if limiter.max_requests == 0 {
                    return Err(invalid(name, "limiter.max_requests", "must be at least 1"));
                }
                if limiter.window_ms == 0 {
                    return Err(invalid(name, "limiter.window_ms", "must be non-zero"));
                }
            }
        }
        Ok(())
    }

    /// Breaker config from the defaults section alone.
    pub fn default_breaker_config(&self) -> CircuitBreakerConfig {
        self.defaults
            .breaker
            .as_ref()
            .map(BreakerSettings::to_config)
            .unwrap_or_default()
    }

    /// Limiter config from the defaults section alone.
    pub fn default_limiter_config(&self) -> RateLimiterConfig {
        self.defaults
            .limiter
            .as_ref()
            .map(LimiterSettings::to_config)
            .unwrap_or_default()
    }

    /// Resolved breaker config for a dependency.
    pub fn breaker_config(&self, name: &str) -> CircuitBreakerConfig {
        self.dependencies
            .get(name)
            .and_then(|dep| dep.breaker.as_ref())
            .map(BreakerSettings::to_config)
            .unwrap_or_else(|| self.default_breaker_config())
    }

    /// Resolved limiter config for a dependency.
    pub fn limiter_config(&self, name: &str) -> RateLimiterConfig {
        self.dependencies
            .get(name)
            .and_then(|dep| dep.limiter.as_ref())
            .map(LimiterSettings::to_config)
            .unwrap_or_else(|| self.default_limiter_config())
    }

    /// Registry seeded with every configured dependency's breaker.
    pub fn breaker_registry(&self) -> CircuitBreakerRegistry {
        let registry = CircuitBreakerRegistry::with_config(self.default_breaker_config());
        for name in self.dependencies.keys() {
            registry.get_with_config(name, self.breaker_config(name));
        }
        registry
    }

    /// Registry seeded with every configured dependency's limiter.
    pub fn limiter_registry(&self) -> RateLimiterRegistry {
        let registry = RateLimiterRegistry::with_config(self.default_limiter_config());
        for name in self.dependencies.keys() {
            registry.get_with_config(name, self.limiter_config(name));
        }
        registry
    }
}

fn invalid(section: &str, field: &str, details: &str) -> Error {
    Error::validation_with_context(
        format!("invalid setting in '{section}'"),
        ErrorContext::new()
            .with_field_path(field)
            .with_details(details)
            .with_source("settings_loader"),
    )
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string())
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    parse_env(key)
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    parse_env(key)
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env_string(key) {
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            Error::configuration_with_context(
                format!("invalid value '{raw}'"),
                ErrorContext::new()
                    .with_field_path(key)
                    .with_source("settings_loader"),
            )
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
defaults:
  breaker:
    failure_threshold: 4
  limiter:
    strategy: token-bucket
    max_requests: 120
    window_ms: 60000
dependencies:
  llm-server:
    limiter:
      strategy: sliding-window
      max_requests: 20
      window_ms: 10000
  image-api:
    breaker:
      failure_threshold: 2
      reset_timeout_ms: 5000
"#;

    #[test]
    fn test_parse_and_resolve() {
        let settings = ResilienceSettings::from_yaml_str(SAMPLE).unwrap();

        let llm = settings.limiter_config("llm-server");
        assert_eq!(llm.strategy, RateLimitStrategy::SlidingWindow);
        assert_eq!(llm.max_requests, 20);
        assert_eq!(llm.window, Duration::from_secs(10));

        // Unlisted sections fall back to defaults.
        let llm_breaker = settings.breaker_config("llm-server");
        assert_eq!(llm_breaker.failure_threshold, 4);

        let image = settings.breaker_config("image-api");
        assert_eq!(image.failure_threshold, 2);
        assert_eq!(image.reset_timeout, Duration::from_millis(5000));

        // Unknown dependency: defaults all the way down.
        let other = settings.limiter_config("search-api");
        assert_eq!(other.max_requests, 120);
    }

    #[test]
    fn test_empty_document_is_all_defaults() {
        let settings = ResilienceSettings::from_yaml_str("{}").unwrap();
        let breaker = settings.breaker_config("anything");
        assert_eq!(breaker.failure_threshold, 5);
        assert_eq!(breaker.reset_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_validation_rejects_zero_threshold() {
        let err = ResilienceSettings::from_yaml_str(
            "defaults:\n  breaker:\n    failure_threshold: 0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("failure_threshold"));
    }

    #[test]
    fn test_validation_rejects_zero_window() {
        let err = ResilienceSettings::from_yaml_str(
            "dependencies:\n  db:\n    limiter:\n      window_ms: 0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("window_ms"));
    }

    #[test]
    fn test_seeded_registries() {
        let settings = ResilienceSettings::from_yaml_str(SAMPLE).unwrap();
        let breakers = settings.breaker_registry();
        let limiters = settings.limiter_registry();

        assert_eq!(
            breakers.get("image-api").config().failure_threshold,
            2
        );
        assert_eq!(limiters.get("llm-server").config().max_requests, 20);
    }

    #[test]
    fn test_env_overrides() {
        // Single test touches the BREAKWATER_* keys to avoid races between
        // parallel tests.
        std::env::set_var("BREAKWATER_FAILURE_THRESHOLD", "9");
        std::env::set_var("BREAKWATER_STRATEGY", "sliding-window");
        let settings = ResilienceSettings::default()
            .apply_env_overrides()
            .unwrap();
        assert_eq!(settings.breaker_config("x").failure_threshold, 9);
        assert_eq!(
            settings.limiter_config("x").strategy,
            RateLimitStrategy::SlidingWindow
        );

        std::env::set_var("BREAKWATER_FAILURE_THRESHOLD", "not-a-number");
        let err = ResilienceSettings::default()
            .apply_env_overrides()
            .unwrap_err();
        assert!(err.to_string().contains("BREAKWATER_FAILURE_THRESHOLD"));

        std::env::remove_var("BREAKWATER_FAILURE_THRESHOLD");
        std::env::remove_var("BREAKWATER_STRATEGY");
    }
}
