//! Prometheus metrics implementation.
//!
//! Implements the `Metrics` trait on top of the global `metrics` crate
//! registry. The sibling `counters.rs` names and labels every series, and
//! `recorder.rs` owns the single `PrometheusHandle` used for rendering.

use crate::domain::Metrics;
use std::time::Instant;

/// Prometheus-based metrics implementation.
///
/// Holds no state: series are registered on first use through the
/// `counter!()`, `gauge!()` and `histogram!()` macros.
pub struct PrometheusMetrics {}

impl PrometheusMetrics {
    pub fn new() -> Self {
        tracing::info!("Creating Prometheus metrics");
        PrometheusMetrics {}
    }
}

impl Metrics for PrometheusMetrics {
    fn render(&self) -> String {
        super::render_metrics()
    }

    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16) {
        super::track_http_request(start, path, method, status);
    }

    fn record_login(&self, success: bool) {
        tracing::debug!("Recording login attempt (success: {})", success);
        super::increment_login(success);
    }

    fn record_message_relayed(&self, delivered: bool) {
        super::increment_message_relayed(delivered);
    }

    fn record_message_dropped(&self, reason: &'static str) {
        super::increment_message_dropped(reason);
    }

    fn record_open_connections(&self, count: usize) {
        super::set_open_connections(count);
    }
}
