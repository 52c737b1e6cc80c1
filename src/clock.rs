//! Time source for every session timer
//!
//! Debounce, idle timeout, the speaking guard window and the API rate gate
//! all read time through [`Clock`], so tests can drive them with
//! [`ManualClock`] instead of sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of monotonic time and blocking delays
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by [`Instant::now`] and [`std::thread::sleep`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually advanced clock
///
/// `sleep` advances time instantly. With [`ManualClock::with_auto_advance`]
/// every `now` call also moves time forward by a fixed step, which lets a
/// polling loop make progress without anyone calling [`ManualClock::advance`].
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    step: Duration,
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self::with_auto_advance(Duration::ZERO)
    }

    /// Create a clock that advances by `step` on every `now` call
    #[must_use]
    pub fn with_auto_advance(step: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                step,
            })),
        }
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.now += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = state.now;
        let step = state.step;
        state.now += step;
        now
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_secs(3));
        assert_eq!(clock.now() - start, Duration::from_secs(3));
    }

    #[test]
    fn test_manual_clock_auto_advance() {
        let clock = ManualClock::with_auto_advance(Duration::from_millis(10));
        let a = clock.now();
        let b = clock.now();
        assert_eq!(b - a, Duration::from_millis(10));
    }

    #[test]
    fn test_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let start = clock.now();
        other.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - start, Duration::from_millis(250));
    }
}
