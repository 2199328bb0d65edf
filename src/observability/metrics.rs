//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wstunnel_sessions_total` (counter): sessions that reached `Active`, by role
//! - `wstunnel_sessions_active` (gauge): sessions currently bridging, by role
//! - `wstunnel_bytes_total` (counter): bytes forwarded, by direction
//! - `wstunnel_dial_failures_total` (counter): failed outbound dials, by role
//! - `wstunnel_upgrade_failures_total` (counter): rejected or failed upgrades
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - The Prometheus exporter is opt-in

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::Mode;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn session_started(role: Mode) {
    counter!("wstunnel_sessions_total", "role" => role.as_str()).increment(1);
    gauge!("wstunnel_sessions_active", "role" => role.as_str()).increment(1.0);
}

pub fn session_finished(role: Mode, tcp_to_ws: u64, ws_to_tcp: u64) {
    gauge!("wstunnel_sessions_active", "role" => role.as_str()).decrement(1.0);
    counter!("wstunnel_bytes_total", "direction" => "tcp_to_ws").increment(tcp_to_ws);
    counter!("wstunnel_bytes_total", "direction" => "ws_to_tcp").increment(ws_to_tcp);
}

pub fn dial_failed(role: Mode) {
    counter!("wstunnel_dial_failures_total", "role" => role.as_str()).increment(1);
}

pub fn upgrade_failed(reason: &'static str) {
    counter!("wstunnel_upgrade_failures_total", "reason" => reason).increment(1);
}
