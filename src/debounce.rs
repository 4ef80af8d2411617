// Coalescing stage between encoding mutations and query dispatch.
//
// Rapid bursts of mutations (several filter toggles, a drag sequence) must
// collapse into one network round-trip: each event resets the delay timer
// and the stage fires at most once per quiet period.

use std::time::{Duration, Instant};

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet_period: Duration,
    deadline: Option<Instant>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Debouncer::new(DEFAULT_QUIET_PERIOD)
    }
}

impl Debouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Debouncer { quiet_period, deadline: None }
    }

    /// Record an event at `now`, pushing the deadline out by one quiet
    /// period.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet_period);
    }

    /// True while an event is pending and its deadline has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fire if the quiet period has elapsed. Disarms on firing, so a
    /// deadline fires exactly once until the next `trigger`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
