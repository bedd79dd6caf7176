//! Observability — event sink seam and Prometheus metrics.

pub mod metrics;
pub mod sink;
pub mod traits;

pub use metrics::Metrics;
pub use sink::TracingEventSink;
pub use traits::{EventSink, NoopSink};

use std::sync::Arc;

/// Create the default event sink, wired to the given metrics registry.
pub fn create_event_sink(metrics: Arc<Metrics>) -> Arc<dyn EventSink> {
    Arc::new(TracingEventSink::new(metrics))
}
