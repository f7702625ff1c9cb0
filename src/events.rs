//! Breaker transition events and their fan-out sinks.
//!
//! Every [`crate::breaker::CircuitBreaker`] reports its state transitions
//! through a [`BreakerEventSink`]. Sinks are plain trait objects handed in at
//! construction time, so applications (and tests) wire up exactly the
//! observability they want instead of subscribing to process-wide state.
//!
//! | Sink | Description |
//! |------|-------------|
//! | [`TracingEventSink`] | Logs transitions through `tracing` (default) |
//! | [`InMemoryEventSink`] | Buffers events for inspection in tests |
//! | [`CompositeEventSink`] | Fans out to multiple destinations |
//! | [`NoopEventSink`] | Discards everything |

use std::sync::{Arc, RwLock};

use crate::breaker::CircuitState;

/// A state transition or lifecycle event emitted by a circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerEvent {
    /// Emitted on every transition, alongside the specific event below.
    StateChange {
        name: String,
        from: CircuitState,
        to: CircuitState,
    },
    /// The breaker tripped open; calls will be rejected until the cooldown elapses.
    Opened { name: String },
    /// The breaker closed; normal operation resumed.
    Closed { name: String },
    /// The breaker is letting trial calls through after its cooldown.
    HalfOpened { name: String },
}

impl BreakerEvent {
    /// Name of the breaker this event belongs to.
    pub fn breaker_name(&self) -> &str {
        match self {
            Self::StateChange { name, .. }
            | Self::Opened { name }
            | Self::Closed { name }
            | Self::HalfOpened { name } => name,
        }
    }
}

/// Destination for breaker events.
///
/// Emission happens synchronously on the caller's task, after the breaker has
/// released its state lock. Implementations must not block.
pub trait BreakerEventSink: Send + Sync {
    fn on_event(&self, event: &BreakerEvent);
}

/// Default no-op sink (no collection).
pub struct NoopEventSink;

impl BreakerEventSink for NoopEventSink {
    fn on_event(&self, _event: &BreakerEvent) {}
}

/// Sink that forwards transitions to `tracing`.
///
/// Opens log at `warn` since they usually mean a dependency is misbehaving;
/// recovery transitions log at `info`.
#[derive(Default)]
pub struct TracingEventSink;

impl BreakerEventSink for TracingEventSink {
    fn on_event(&self, event: &BreakerEvent) {
        match event {
            BreakerEvent::Opened { name } => {
                tracing::warn!(breaker = %name, "circuit breaker opened");
            }
            BreakerEvent::Closed { name } => {
                tracing::info!(breaker = %name, "circuit breaker closed");
            }
            BreakerEvent::HalfOpened { name } => {
                tracing::info!(breaker = %name, "circuit breaker half-open, probing");
            }
            BreakerEvent::StateChange { name, from, to } => {
                tracing::debug!(breaker = %name, ?from, ?to, "circuit breaker state change");
            }
        }
    }
}

/// In-memory sink for testing.
pub struct InMemoryEventSink {
    events: RwLock<Vec<BreakerEvent>>,
    max_events: usize,
}

impl InMemoryEventSink {
    pub fn new(max: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events: max,
        }
    }

    pub fn events(&self) -> Vec<BreakerEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn events_for(&self, breaker: &str) -> Vec<BreakerEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.breaker_name() == breaker)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryEventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl BreakerEventSink for InMemoryEventSink {
    fn on_event(&self, event: &BreakerEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event.clone());
            if events.len() > self.max_events {
                events.remove(0);
            }
        }
    }
}

/// Composite sink for multiple destinations.
pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn BreakerEventSink>>,
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(mut self, sink: Arc<dyn BreakerEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Default for CompositeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakerEventSink for CompositeEventSink {
    fn on_event(&self, event: &BreakerEvent) {
        for sink in &self.sinks {
            sink.on_event(event);
        }
    }
}
