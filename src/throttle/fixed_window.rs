//! Fixed-window rate limiter implementation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use super::traits::{RateDecision, RateLimiter};
use crate::identity::ClientIdentity;

/// Counter state for one identity's current window.
#[derive(Debug, Clone, Copy)]
struct WindowState {
    count: u32,
    window_start: DateTime<Utc>,
}

/// Fixed-window counter: `limit` requests per `window` per identity.
///
/// The counter resets lazily when the identity is next seen after its
/// window elapses; [`evict_stale`](RateLimiter::evict_stale) drops counters
/// for identities that never come back.
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<ClientIdentity, WindowState>>,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn allow_at(&self, identity: &ClientIdentity, now: DateTime<Utc>) -> RateDecision {
        let mut windows = self.windows.lock();
        let state = windows.entry(identity.clone()).or_insert(WindowState {
            count: 0,
            window_start: now,
        });

        if now.signed_duration_since(state.window_start) >= self.window {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= self.limit {
            let window_end = state.window_start + self.window;
            let retry_after = window_end
                .signed_duration_since(now)
                .to_std()
                .unwrap_or_default()
                .max(std::time::Duration::from_secs(1));
            return RateDecision::Denied { retry_after };
        }

        state.count += 1;
        RateDecision::Allowed {
            remaining: self.limit - state.count,
        }
    }

    fn evict_stale_at(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, state| now.signed_duration_since(state.window_start) < self.window);
        before - windows.len()
    }

    #[cfg(test)]
    fn tracked_identities(&self) -> usize {
        self.windows.lock().len()
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn allow(&self, identity: &ClientIdentity) -> RateDecision {
        self.allow_at(identity, Utc::now())
    }

    fn evict_stale(&self) -> usize {
        self.evict_stale_at(Utc::now())
    }

    fn name(&self) -> &str {
        "fixed_window"
    }
}
