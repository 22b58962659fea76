//! Fixed-window limiter for outbound provider calls.
//!
//! The free Alpha Vantage tier allows a handful of calls per minute. Calls
//! beyond the window's permits are refused immediately; nothing is queued.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

#[derive(Debug)]
struct Window {
    started: Instant,
    used: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    permits: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(permits: u32, window: Duration) -> Self {
        Self {
            permits,
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                used: 0,
            }),
        }
    }

    pub fn per_minute(permits: u32) -> Self {
        Self::new(permits, Duration::from_secs(60))
    }

    /// Takes a permit from the current window. On refusal, returns the time
    /// left until the window resets.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.lock_state();
        let now = Instant::now();

        let elapsed = now.duration_since(state.started);
        if elapsed >= self.window {
            state.started = now;
            state.used = 0;
        }

        if state.used < self.permits {
            state.used += 1;
            Ok(())
        } else {
            Err(self.window.saturating_sub(now.duration_since(state.started)))
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, Window> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
