use std::time::{Duration, Instant};

/// Token bucket: continuous-average rate with burst capacity.
///
/// Refill happens lazily on access, in whole refill intervals; no background
/// timer. All methods take `now` so the facade controls the clock and tests
/// can replay time.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    /// Tokens added per elapsed `refill_interval`.
    refill_rate: f64,
    refill_interval: Duration,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64, refill_interval: Duration, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_rate,
            refill_interval,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        if self.refill_interval.is_zero() {
            return;
        }
        let elapsed = now.saturating_duration_since(self.last_refill);
        let intervals = elapsed.as_nanos() / self.refill_interval.as_nanos();
        if intervals > 0 {
            self.tokens =
                (self.tokens + intervals as f64 * self.refill_rate).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Consume `cost` tokens if available. No partial consumption: on `false`
    /// the balance is untouched.
    pub fn try_consume(&mut self, cost: f64, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Time until at least one whole token is available.
    pub fn time_until_next_token(&mut self, now: Instant) -> Duration {
        self.refill(now);
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        if self.refill_rate <= 0.0 {
            return Duration::MAX;
        }
        let intervals = ((1.0 - self.tokens) / self.refill_rate).ceil();
        self.refill_interval.mul_f64(intervals)
    }

    /// Current balance after refill.
    pub fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Restore the bucket to full.
    pub fn reset(&mut self, now: Instant) {
        self.tokens = self.capacity;
        self.last_refill = now;
    }
}
