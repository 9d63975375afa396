use parking_lot::Mutex;
use std::time::{Duration, Instant};

struct BreakerState {
    failures: u32,
    last_failure: Option<Instant>,
    trial_started: Option<Instant>,
}

/// Consecutive-failure breaker guarding an upstream dependency. Once
/// `max_failures` is reached, calls are skipped until `retry_interval` has
/// passed since the last failure; one call is then let through as a trial
/// while the rest keep being skipped. A trial call that never reports back is
/// replaced after another `retry_interval`.
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    max_failures: u32,
    retry_interval: Duration,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, retry_interval: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState {
                failures: 0,
                last_failure: None,
                trial_started: None,
            }),
            max_failures,
            retry_interval,
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failures = state.failures.saturating_add(1);
        state.last_failure = Some(Instant::now());
        state.trial_started = None;
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.failures = 0;
        state.last_failure = None;
        state.trial_started = None;
    }

    pub fn should_try(&self) -> bool {
        let mut state = self.state.lock();
        if state.failures < self.max_failures {
            return true;
        }
        let cooled_down = state
            .last_failure
            .is_none_or(|last| last.elapsed() >= self.retry_interval);
        let trial_pending = state
            .trial_started
            .is_some_and(|started| started.elapsed() < self.retry_interval);
        if cooled_down && !trial_pending {
            state.trial_started = Some(Instant::now());
            true
        } else {
            false
        }
    }
}
