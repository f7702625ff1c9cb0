use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Exact-count limiter: at most `max_requests` in any trailing `window`.
///
/// Keeps the timestamps of admitted requests and prunes expired entries on
/// every check. Like [`super::token_bucket::TokenBucket`], the clock is
/// passed in by the caller.
#[derive(Debug)]
pub struct SlidingWindow {
    max_requests: usize,
    window: Duration,
    requests: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: VecDeque::with_capacity(max_requests.min(1024)),
        }
    }

    /// Drop entries that fell out of the trailing window.
    fn prune(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while let Some(&front) = self.requests.front() {
            if front <= cutoff {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit a request at `now` if the window has room.
    pub fn try_request(&mut self, now: Instant) -> bool {
        self.prune(now);
        if self.requests.len() < self.max_requests {
            self.requests.push_back(now);
            true
        } else {
            false
        }
    }

    /// Time until the oldest in-window request expires and a slot opens.
    pub fn time_until_reset(&mut self, now: Instant) -> Duration {
        self.prune(now);
        if self.requests.len() < self.max_requests {
            return Duration::ZERO;
        }
        match self.requests.front() {
            Some(&oldest) => (oldest + self.window).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Admitted requests still inside the window.
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.requests.len()
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Forget all admitted requests.
    pub fn reset(&mut self) {
        self.requests.clear();
    }
}
