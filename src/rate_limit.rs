//! Rolling-window rate limiting for upstream API calls.
//!
//! Each upstream operation class (group listing, user listing, presence
//! lookup) gets an independent sliding-window budget. Unlike a rejecting
//! limiter, [`RateLimiter::acquire`] never fails: a caller over budget is
//! parked until the oldest call in the window ages out, then admitted. Calls
//! are delayed, never dropped.

use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-window admission control for one operation class.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum calls admitted per trailing window.
    limit: u32,
    /// Window length.
    window: Duration,
    /// Admission timestamps still inside the window, oldest first.
    calls: VecDeque<Instant>,
}

impl RateLimiter {
    /// Create a limiter admitting at most `limit` calls per `window`.
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            calls: VecDeque::with_capacity(limit as usize),
        }
    }

    /// Create a limiter admitting at most `limit` calls per minute.
    #[must_use]
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Wait until a call is admitted, then record it.
    ///
    /// Returns immediately when fewer than `limit` calls happened in the
    /// trailing window; otherwise sleeps until the oldest recorded call
    /// expires. Serializes callers of the same class by construction
    /// (`&mut self`), with no fairness guarantee across classes.
    pub async fn acquire(&mut self) {
        loop {
            let now = Instant::now();

            // Drop timestamps that have aged out of the window.
            while let Some(&first) = self.calls.front() {
                if now.saturating_duration_since(first) >= self.window {
                    self.calls.pop_front();
                } else {
                    break;
                }
            }

            if self.calls.len() < self.limit as usize {
                self.calls.push_back(now);
                return;
            }

            match self.calls.front() {
                Some(&oldest) => tokio::time::sleep_until(oldest + self.window).await,
                // limit == 0: nothing can ever expire, so just back off a
                // full window each pass.
                None => tokio::time::sleep(self.window).await,
            }
        }
    }

    /// Calls still admissible in the current window without waiting.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        let now = Instant::now();
        let in_window = self
            .calls
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < self.window)
            .count();
        self.limit.saturating_sub(in_window as u32)
    }
}

/// The three upstream call budgets, one independent limiter per class.
#[derive(Debug)]
pub struct ApiRateLimiters {
    /// Budget for group listing calls.
    pub groups: RateLimiter,
    /// Budget for user listing calls.
    pub users: RateLimiter,
    /// Budget for per-user presence lookups.
    pub presence: RateLimiter,
}

impl ApiRateLimiters {
    /// Build all three limiters from configuration.
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            groups: RateLimiter::per_minute(config.groups_per_minute),
            users: RateLimiter::per_minute(config.users_per_minute),
            presence: RateLimiter::per_minute(config.presence_per_minute),
        }
    }
}

impl Default for ApiRateLimiters {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}
