mod counters;
mod prometheus_metrics;
mod recorder;

pub use prometheus_metrics::PrometheusMetrics;
use std::sync::Arc;

// Re-export utilities for internal use within this module
pub(crate) use counters::{
    increment_login, increment_message_dropped, increment_message_relayed, set_open_connections,
    track_http_request,
};
pub(crate) use recorder::{init_metrics, render_metrics};

/// Creates a new Prometheus metrics implementation.
///
/// Installs the global recorder on first use; the returned instance renders
/// everything recorded through the `metrics` facade.
pub fn create() -> anyhow::Result<crate::domain::MetricsPtr> {
    tracing::info!("Initializing Prometheus metrics");
    init_metrics()?;

    Ok(Arc::new(PrometheusMetrics::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Metrics;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_create_returns_valid_metrics() {
        let result = create();
        assert!(result.is_ok());
    }

    #[test]
    #[serial]
    fn test_create_is_idempotent_and_renders_chat_metrics() {
        let first = create().unwrap();
        let second = create().unwrap();

        first.record_login(true);
        second.record_message_dropped("malformed");

        let rendered = first.render();
        assert!(rendered.contains("chat_logins_total"));
        assert!(rendered.contains("chat_messages_dropped_total"));
    }
}
