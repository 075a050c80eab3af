//! Rate limiting for outbound collaborator calls.
//!
//! Each client owns one [`RateLimiter`] per documented limit. Callers invoke
//! [`RateLimiter::acquire`] before dispatching a request; it suspends the task
//! until the sliding window has room instead of spinning.

use std::collections::VecDeque;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rate limiting error.
#[derive(Debug, Clone, Error)]
pub enum RateLimitError {
    /// Rate limit exceeded; must wait before sending.
    #[error("rate limit exceeded; retry after {retry_after:?}")]
    Exceeded {
        /// Time until the oldest call leaves the window.
        retry_after: Duration,
    },
}

/// Sliding window of call timestamps.
#[derive(Debug, Clone)]
struct Window {
    max_calls: u32,
    period: Duration,
    calls: VecDeque<Instant>,
}

impl Window {
    fn try_record(&mut self, now: Instant) -> Result<(), RateLimitError> {
        // Drop timestamps that have aged out of the window
        while let Some(&first) = self.calls.front() {
            if now.duration_since(first) >= self.period {
                self.calls.pop_front();
            } else {
                break;
            }
        }

        if self.calls.len() >= self.max_calls as usize {
            if let Some(&oldest) = self.calls.front() {
                let age = now.duration_since(oldest);
                let retry_after = self.period.saturating_sub(age);
                return Err(RateLimitError::Exceeded { retry_after });
            }
        }

        self.calls.push_back(now);
        Ok(())
    }
}

/// Async sliding-window rate limiter: at most `max_calls` per `period`.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_calls` per `period`. A zero limit is
    /// treated as one call per period.
    #[must_use]
    pub fn new(name: &'static str, max_calls: u32, period: Duration) -> Self {
        Self {
            name,
            window: Mutex::new(Window {
                max_calls: max_calls.max(1),
                period,
                calls: VecDeque::new(),
            }),
        }
    }

    /// Shorthand for a per-minute limit.
    #[must_use]
    pub fn per_minute(name: &'static str, max_calls: u32) -> Self {
        Self::new(name, max_calls, Duration::from_secs(60))
    }

    /// Record a call if the window has room.
    pub async fn try_acquire(&self) -> Result<(), RateLimitError> {
        self.window.lock().await.try_record(Instant::now())
    }

    /// Wait until the window has room, then record the call.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire().await {
                Ok(()) => return,
                Err(RateLimitError::Exceeded { retry_after }) => {
                    tracing::debug!(limiter = self.name, ?retry_after, "rate limited; waiting");
                    tokio::time::sleep(retry_after).await;
                }
            }
        }
    }

    /// Calls still available in the current window.
    pub async fn remaining(&self) -> u32 {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        let period = window.period;
        window.calls.retain(|&t| now.duration_since(t) < period);
        window.max_calls.saturating_sub(window.calls.len() as u32)
    }
}
