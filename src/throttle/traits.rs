//! Rate limiting traits and types — the first gate in front of the store.

use async_trait::async_trait;
use std::time::Duration;

use crate::identity::ClientIdentity;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    /// Under the limit; the request may proceed.
    Allowed { remaining: u32 },
    /// Over the limit until the current window elapses.
    Denied { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, RateDecision::Denied { .. })
    }

    /// Retry guidance for a denied request.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateDecision::Allowed { .. } => None,
            RateDecision::Denied { retry_after } => Some(*retry_after),
        }
    }
}

/// Per-identity request throttle, evaluated strictly before any store
/// access. A denial must short-circuit the request with zero store side
/// effects.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check and consume one slot for `identity`. The check-and-increment
    /// is atomic per identity.
    async fn allow(&self, identity: &ClientIdentity) -> RateDecision;

    /// Drop counters for identities inactive past the window, bounding the
    /// limiter's memory the same way the session store is bounded. Returns
    /// the number of counters evicted.
    fn evict_stale(&self) -> usize;

    /// The name of this rate limiter implementation.
    fn name(&self) -> &str;
}
