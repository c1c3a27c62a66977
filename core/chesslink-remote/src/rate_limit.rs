//! Local request budget for the remote API.
//!
//! Two clocks gate every call: a cool-down deadline set after the server
//! answers 429, and a sliding window that caps how many calls may start
//! within `window`. Both live behind one mutex so check-and-record is atomic
//! with respect to concurrent callers.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Default)]
struct Budget {
    cooldown_until: Option<Instant>,
    recent: VecDeque<Instant>,
}

impl Budget {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.recent.front() {
            if now.duration_since(oldest) >= window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Sliding-window rate limiter with a server cool-down.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    budget: Mutex<Budget>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window`.
    ///
    /// `max_requests == 0` disables the window and leaves only the cool-down.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            budget: Mutex::new(Budget::default()),
        }
    }

    fn budget(&self) -> MutexGuard<'_, Budget> {
        self.budget.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserves one request slot.
    ///
    /// Returns the time left until a slot frees up when the call must not be
    /// made.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut budget = self.budget();

        if let Some(until) = budget.cooldown_until {
            if now < until {
                return Err(until - now);
            }
            budget.cooldown_until = None;
        }

        if self.max_requests > 0 {
            budget.prune(now, self.window);
            if budget.recent.len() >= self.max_requests as usize {
                let oldest = budget.recent.front().copied().unwrap_or(now);
                let wait = self.window.saturating_sub(now.duration_since(oldest));
                debug!(wait_ms = wait.as_millis() as u64, "request budget exhausted");
                return Err(wait);
            }
            budget.recent.push_back(now);
        }
        Ok(())
    }

    /// Blocks all calls for `delay` from now.
    pub fn cool_down(&self, delay: Duration) {
        let until = Instant::now() + delay;
        let mut budget = self.budget();
        // Never shorten a running cool-down.
        if budget.cooldown_until.is_none_or(|current| current < until) {
            budget.cooldown_until = Some(until);
        }
    }

    /// Time left on the cool-down, if one is running.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        self.budget()
            .cooldown_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Requests recorded within the current window.
    pub fn in_flight_window(&self) -> usize {
        let mut budget = self.budget();
        budget.prune(Instant::now(), self.window);
        budget.recent.len()
    }
}
