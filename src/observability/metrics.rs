//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_decisions_total` (counter): audit records by outcome, host
//! - `proxy_upstream_duration_seconds` (histogram): time to upstream headers
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Host labels only come from the Policy Set (unknown hosts are
//!   collapsed into "unknown") so label cardinality stays bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_decision(outcome: &'static str, host: &str) {
    ::metrics::counter!(
        "proxy_decisions_total",
        "outcome" => outcome,
        "host" => host.to_string()
    )
    .increment(1);
}

pub fn record_upstream(host: &str, start: Instant) {
    ::metrics::histogram!(
        "proxy_upstream_duration_seconds",
        "host" => host.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}
