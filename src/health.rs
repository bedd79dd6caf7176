//! Process health snapshot for the gateway.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Record process start. Idempotent; the first call wins.
pub fn mark_started() {
    let _ = STARTED_AT.set(Instant::now());
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
}

/// Current health snapshot. Uptime reads zero until [`mark_started`] runs.
pub fn snapshot() -> HealthSnapshot {
    let uptime_seconds = STARTED_AT.get().map_or(0, |s| s.elapsed().as_secs());
    HealthSnapshot {
        status: "healthy",
        timestamp: Utc::now(),
        uptime_seconds,
    }
}
