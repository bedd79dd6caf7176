//! Prometheus metrics for the admission-control core.

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Counter and gauge set served at `/metrics`.
pub struct Metrics {
    registry: Registry,
    pub sessions_active: IntGauge,
    pub sessions_reclaimed: IntCounter,
    pub admission_rejected: IntCounter,
    pub rate_limited: IntCounter,
    pub reclaim_failures: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let sessions_active = IntGauge::new(
            "maitre_sessions_active",
            "Session records currently held by the store",
        )?;
        let sessions_reclaimed = IntCounter::new(
            "maitre_sessions_reclaimed_total",
            "Expired sessions removed by the reclaimer",
        )?;
        let admission_rejected = IntCounter::new(
            "maitre_admission_rejected_total",
            "Requests refused by capacity, quota, or message-cap checks",
        )?;
        let rate_limited = IntCounter::new(
            "maitre_rate_limited_total",
            "Requests refused by the rate limiter",
        )?;
        let reclaim_failures = IntCounter::new(
            "maitre_reclaim_failures_total",
            "Reclaimer sweeps that did not complete",
        )?;

        registry.register(Box::new(sessions_active.clone()))?;
        registry.register(Box::new(sessions_reclaimed.clone()))?;
        registry.register(Box::new(admission_rejected.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;
        registry.register(Box::new(reclaim_failures.clone()))?;

        Ok(Self {
            registry,
            sessions_active,
            sessions_reclaimed,
            admission_rejected,
            rate_limited,
            reclaim_failures,
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
