//! Request throttling — per-identity admission ahead of the session store.

pub mod fixed_window;
pub mod traits;

pub use fixed_window::FixedWindowLimiter;
pub use traits::{RateDecision, RateLimiter};

use chrono::Duration;
use std::sync::Arc;

/// Create the default fixed-window rate limiter.
pub fn create_rate_limiter(limit: u32, window: Duration) -> Arc<dyn RateLimiter> {
    Arc::new(FixedWindowLimiter::new(limit, window))
}
