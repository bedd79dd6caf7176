//! Event sink that logs through tracing and bumps the matching counters.

use std::sync::Arc;
use tracing::info;

use super::metrics::Metrics;
use super::traits::EventSink;

/// Default sink: one structured log line per event, plus counter updates
/// for the events the metrics registry tracks.
pub struct TracingEventSink {
    metrics: Arc<Metrics>,
}

impl TracingEventSink {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    fn attr<'a>(attributes: &'a [(&str, String)], key: &str) -> Option<&'a str> {
        attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl EventSink for TracingEventSink {
    fn record_event(&self, name: &str, attributes: &[(&str, String)]) {
        match name {
            "sessions_reclaimed" => {
                if let Some(count) = Self::attr(attributes, "count").and_then(|v| v.parse().ok()) {
                    self.metrics.sessions_reclaimed.inc_by(count);
                }
            }
            "reclaim_failed" => self.metrics.reclaim_failures.inc(),
            _ => {}
        }

        let rendered: Vec<String> = attributes.iter().map(|(k, v)| format!("{k}={v}")).collect();
        info!(target: "maitre::events", event = name, attributes = %rendered.join(" "));
    }

    fn name(&self) -> &str {
        "tracing"
    }
}
