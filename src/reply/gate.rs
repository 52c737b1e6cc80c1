//! Minimum-interval gate for response generator calls

use std::time::{Duration, Instant};

use crate::clock::Clock;

/// Serializes provider calls so no two start closer than `interval` apart
///
/// A rate-limited response pushes the next allowed call further out.
#[derive(Debug, Clone)]
pub struct RateGate {
    interval: Duration,
    backoff: Duration,
    last_call: Option<Instant>,
    blocked_until: Option<Instant>,
}

impl RateGate {
    /// Create a gate with a minimum `interval` between calls and a default
    /// `backoff` applied after a rate-limited response
    #[must_use]
    pub const fn new(interval: Duration, backoff: Duration) -> Self {
        Self {
            interval,
            backoff,
            last_call: None,
            blocked_until: None,
        }
    }

    /// Block until a call is allowed, then record it
    ///
    /// Returns how long the caller waited.
    pub fn acquire(&mut self, clock: &dyn Clock) -> Duration {
        let now = clock.now();
        let earliest = [
            self.last_call.map(|last| last + self.interval),
            self.blocked_until,
        ]
        .into_iter()
        .flatten()
        .max();

        let wait = earliest.map_or(Duration::ZERO, |at| at.saturating_duration_since(now));
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis(), "rate gate waiting");
            clock.sleep(wait);
        }

        self.last_call = Some(now + wait);
        self.blocked_until = None;
        wait
    }

    /// Record a rate-limited response; the next call waits `retry_after`
    /// (or the configured backoff) from `now`
    pub fn backoff(&mut self, now: Instant, retry_after: Option<Duration>) {
        let delay = retry_after.unwrap_or(self.backoff);
        tracing::warn!(delay_ms = delay.as_millis(), "provider rate limited, backing off");
        self.blocked_until = Some(now + delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_first_call_passes_immediately() {
        let clock = ManualClock::new();
        let mut gate = RateGate::new(Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(gate.acquire(&clock), Duration::ZERO);
    }

    #[test]
    fn test_second_call_waits_remaining_interval() {
        let clock = ManualClock::new();
        let mut gate = RateGate::new(Duration::from_secs(1), Duration::from_secs(5));
        gate.acquire(&clock);
        clock.advance(Duration::from_millis(400));
        assert_eq!(gate.acquire(&clock), Duration::from_millis(600));
    }

    #[test]
    fn test_spaced_calls_do_not_wait() {
        let clock = ManualClock::new();
        let mut gate = RateGate::new(Duration::from_secs(1), Duration::from_secs(5));
        gate.acquire(&clock);
        clock.advance(Duration::from_secs(2));
        assert_eq!(gate.acquire(&clock), Duration::ZERO);
    }

    #[test]
    fn test_backoff_defers_next_call() {
        let clock = ManualClock::new();
        let mut gate = RateGate::new(Duration::from_secs(1), Duration::from_secs(5));
        gate.acquire(&clock);
        gate.backoff(clock.now(), None);
        assert_eq!(gate.acquire(&clock), Duration::from_secs(5));

        gate.backoff(clock.now(), Some(Duration::from_secs(2)));
        assert_eq!(gate.acquire(&clock), Duration::from_secs(2));
    }
}
