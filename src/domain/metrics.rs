use std::sync::Arc;
use std::time::Instant;

/// Abstraction for application metrics (counters, gauges, histograms).
pub trait Metrics: Send + Sync + 'static {
    // ---
    /// Render current metrics in Prometheus text format.
    fn render(&self) -> String;

    /// Record HTTP request duration and labels.
    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16);

    /// Record the outcome of a login attempt.
    fn record_login(&self, success: bool);

    /// Record a persisted message and whether the receiver was online for it.
    fn record_message_relayed(&self, delivered: bool);

    /// Record a frame that was dropped before forwarding.
    fn record_message_dropped(&self, reason: &'static str);

    /// Record the current number of registered realtime connections.
    fn record_open_connections(&self, count: usize);
}

/// Type alias for any backend that implements Metrics.
pub type MetricsPtr = Arc<dyn Metrics>;
