//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hysteria_connections_total` (counter): accepted TCP connections
//! - `hysteria_active_connections` (gauge): connections currently open
//! - `hysteria_auth_failures_total` (counter): rejected credentials
//! - `hysteria_requests_total` (counter): tunnel requests by ACL action
//! - `hysteria_stream_end_total` (counter): tunnel ends by kind (eof, error)
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::acl::Action;

/// Install the Prometheus exporter on `addr`. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_connection_accepted() {
    metrics::counter!("hysteria_connections_total").increment(1);
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("hysteria_active_connections").set(count as f64);
}

pub fn record_auth_failure() {
    metrics::counter!("hysteria_auth_failures_total").increment(1);
}

pub fn record_request(action: Option<Action>) {
    let label = match action {
        Some(Action::Direct) => "direct",
        Some(Action::Proxy) => "proxy",
        Some(Action::Block) => "block",
        Some(Action::Hijack) => "hijack",
        None => "unknown",
    };
    metrics::counter!("hysteria_requests_total", "action" => label).increment(1);
}

pub fn record_stream_end(end_of_stream: bool) {
    let kind = if end_of_stream { "eof" } else { "error" };
    metrics::counter!("hysteria_stream_end_total", "kind" => kind).increment(1);
}
