use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Track HTTP request latency and count, labelled by route, method and status.
pub fn track_http_request(start: Instant, path: &str, method: &str, status: u16) {
    let elapsed = start.elapsed();
    let status = status.to_string();
    histogram!(
        "http_request_duration_seconds",
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .record(elapsed);
    counter!(
        "http_requests_total",
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status
    )
    .increment(1);
}

pub fn increment_login(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("chat_logins_total", "outcome" => outcome).increment(1);
}

pub fn increment_message_relayed(delivered: bool) {
    let receiver = if delivered { "online" } else { "offline" };
    counter!("chat_messages_relayed_total", "receiver" => receiver).increment(1);
}

pub fn increment_message_dropped(reason: &'static str) {
    counter!("chat_messages_dropped_total", "reason" => reason).increment(1);
}

pub fn set_open_connections(count: usize) {
    gauge!("chat_open_connections").set(count as f64);
}
