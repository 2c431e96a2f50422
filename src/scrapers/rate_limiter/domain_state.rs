//! Per-domain politeness state.

use std::time::{Duration, Instant};

/// State for a single domain.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Current spacing between requests.
    pub current_delay: Duration,
    /// Instant the most recently granted request may start.
    pub last_slot: Option<Instant>,
    /// Consecutive successes since last rate limit.
    pub consecutive_successes: u32,
    /// Whether currently in backoff.
    pub in_backoff: bool,
    /// Total requests granted.
    pub total_requests: u64,
    /// Total rate limit hits.
    pub rate_limit_hits: u64,
}

impl DomainState {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            current_delay: base_delay,
            last_slot: None,
            consecutive_successes: 0,
            in_backoff: false,
            total_requests: 0,
            rate_limit_hits: 0,
        }
    }

    /// Reserve the next request slot at or after `now`.
    ///
    /// Slots are spaced `current_delay` apart, so concurrent callers queue
    /// up behind each other instead of all waking at the same instant.
    pub fn reserve(&mut self, now: Instant) -> Instant {
        let slot = match self.last_slot {
            Some(last) => (last + self.current_delay).max(now),
            None => now,
        };
        self.last_slot = Some(slot);
        self.total_requests += 1;
        slot
    }
}
