//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `loki_records_pushed_total` (counter): records accepted by the sink
//! - `loki_records_failed_total` (counter): records lost to push failures
//! - `loki_records_dropped_total` (counter): records rejected by a full queue
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, latency: Duration) {
    let method = method.to_string();
    let status = status.to_string();
    ::metrics::counter!("http_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    ::metrics::histogram!("http_request_duration_seconds", "method" => method, "status" => status)
        .record(latency.as_secs_f64());
}

pub fn record_sink_push(success: bool, records: u64) {
    if success {
        ::metrics::counter!("loki_records_pushed_total").increment(records);
    } else {
        ::metrics::counter!("loki_records_failed_total").increment(records);
    }
}

pub fn record_sink_dropped() {
    ::metrics::counter!("loki_records_dropped_total").increment(1);
}
