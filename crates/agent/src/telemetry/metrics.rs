//! Prometheus metrics.
//!
//! Records the following metrics:
//! - `api_requests_total`: Counter with labels (operation, outcome)
//! - `api_request_duration_seconds`: Histogram with label (operation)
//! - `api_parse_errors_total`: Counter with label (operation)
//! - `commands_dispatched_total`: Counter with label (kind)
//! - `poll_cycles_skipped_total`: Counter
//! - `location_fixes_total`: Counter with label (source)

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;
use crate::error::AgentError;

/// Record the outcome and latency of one backend request.
pub fn record_api_request(operation: &'static str, outcome: &'static str, duration_secs: f64) {
    counter!(
        "api_requests_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        "api_request_duration_seconds",
        "operation" => operation
    )
    .record(duration_secs);
}

/// Record a response body that could not be decoded.
pub fn record_parse_error(operation: &'static str) {
    counter!("api_parse_errors_total", "operation" => operation).increment(1);
}

/// Record a command handed to its handlers.
pub fn record_command_dispatched(kind: &'static str) {
    counter!("commands_dispatched_total", "kind" => kind).increment(1);
}

/// Record a poll tick skipped because the previous fetch was still running.
pub fn record_poll_skipped() {
    counter!("poll_cycles_skipped_total").increment(1);
}

/// Record a fix admitted by the location tracker.
pub fn record_location_fix(source: &str) {
    counter!("location_fixes_total", "source" => source.to_string()).increment(1);
}

/// Install the global Prometheus recorder and serve it over HTTP.
///
/// Must be called from within the tokio runtime, once, before any metric is
/// recorded that should be exported.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), AgentError> {
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e| AgentError::Metrics(format!("{}: {}", config.listen_addr, e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(&[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
        .map_err(|e| AgentError::Metrics(e.to_string()))?
        .install()
        .map_err(|e| AgentError::Metrics(e.to_string()))?;

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
