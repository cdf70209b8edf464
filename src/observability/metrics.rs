//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define connection and dispatch metrics
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gbuilder_dispatch_total` (counter): dispatch outcomes by `outcome`
//!   (`full`, `partial`, `reject`, `lifespan`)
//! - `gbuilder_connections_total` (counter): finished connections by final phase
//! - `gbuilder_active_connections` (gauge): current connection count
//! - `gbuilder_connection_duration_seconds` (histogram): connection lifetime
//!
//! # Design Decisions
//! - Labels are static strings; no per-path labels (unbounded cardinality)
//! - The exporter is optional; the facade is a no-op without a recorder

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(outcome: &'static str) {
    metrics::counter!("gbuilder_dispatch_total", "outcome" => outcome).increment(1);
}

pub fn connection_opened() {
    metrics::gauge!("gbuilder_active_connections").increment(1.0);
}

pub fn connection_closed(phase: &'static str, opened_at: Instant) {
    metrics::gauge!("gbuilder_active_connections").decrement(1.0);
    metrics::counter!("gbuilder_connections_total", "phase" => phase).increment(1);
    metrics::histogram!("gbuilder_connection_duration_seconds").record(opened_at.elapsed().as_secs_f64());
}
