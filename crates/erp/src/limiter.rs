//! Shared request rate limiter.
//!
//! The ERP enforces a hard external cap (3 requests/second). Every call path
//! that can burst (batch reconciliation, bulk sync) shares one limiter and
//! either waits for a slot or observes the added latency.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    count: u32,
    started: Instant,
}

/// Rolling-window request limiter.
#[derive(Debug)]
pub struct RequestLimiter {
    max_per_window: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RequestLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            state: Mutex::new(Window {
                count: 0,
                started: Instant::now(),
            }),
        }
    }

    /// The ERP's documented cap: 3 requests per second.
    pub fn erp_default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }

    /// Take a slot if one is free in the current window.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();

        if now.duration_since(state.started) >= self.window {
            state.count = 0;
            state.started = now;
        }

        if state.count < self.max_per_window {
            state.count += 1;
            true
        } else {
            false
        }
    }

    /// Block until a slot is free, then take it.
    pub fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap();
                let now = Instant::now();

                if now.duration_since(state.started) >= self.window {
                    state.count = 0;
                    state.started = now;
                }

                if state.count < self.max_per_window {
                    state.count += 1;
                    return;
                }

                self.window
                    .saturating_sub(now.duration_since(state.started))
            };

            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limiter saturated, waiting");
            std::thread::sleep(wait.max(Duration::from_millis(1)));
        }
    }
}
