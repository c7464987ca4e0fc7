//! Time sources and elapsed-time deadlines
//!
//! Deadlines on the write path are polled, not preemptive: a [`Deadline`] is
//! started once and compared against the clock after each unit of work. The
//! clock is injected so tests can drive time deterministically with
//! [`ManualClock`] instead of sleeping.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually driven clock for tests.
///
/// Clones share the same time, so a sink under test can advance the clock
/// the write set reads. An optional tick advances time on every `now()` call.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    tick: Duration,
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    pub fn new() -> Self {
        Self::with_tick(Duration::ZERO)
    }

    /// Create a clock that moves forward by `tick` each time it is read
    pub fn with_tick(tick: Duration) -> Self {
        ManualClock {
            inner: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                tick,
            })),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        self.inner.lock().now += by;
    }

    /// Change the per-read tick
    pub fn set_tick(&self, tick: Duration) {
        self.inner.lock().tick = tick;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut state = self.inner.lock();
        let now = state.now;
        let tick = state.tick;
        state.now += tick;
        now
    }
}

/// Elapsed-time budget measured from a fixed start instant.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start the budget now
    pub fn start<C: Clock + ?Sized>(clock: &C, budget: Duration) -> Self {
        Deadline {
            start: clock.now(),
            budget,
        }
    }

    /// Configured budget
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time since the deadline was started
    pub fn elapsed<C: Clock + ?Sized>(&self, clock: &C) -> Duration {
        clock.now().saturating_duration_since(self.start)
    }

    /// Whether strictly more than the budget has elapsed
    pub fn is_exceeded<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        self.elapsed(clock) > self.budget
    }
}
