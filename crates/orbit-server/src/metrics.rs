//! Metrics collection and export.
//!
//! Uses the `metrics` crate for instrumentation and exports to Prometheus
//! format. Recording is a no-op until a recorder is installed.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "orbit_relay_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "orbit_relay_connections_active";
    pub const FRAMES_TOTAL: &str = "orbit_relay_frames_total";
    pub const FRAME_BYTES: &str = "orbit_relay_frame_bytes";
    pub const RELAYED_TOTAL: &str = "orbit_relay_events_relayed_total";
    pub const POST_MUTATIONS_TOTAL: &str = "orbit_demo_post_mutations_total";
    pub const ERRORS_TOTAL: &str = "orbit_errors_total";
}

/// Describe every metric.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Relay sockets accepted since server start"
    );
    metrics::describe_gauge!(names::CONNECTIONS_ACTIVE, "Currently open relay sockets");
    metrics::describe_counter!(names::FRAMES_TOTAL, "Relay frames by direction");
    metrics::describe_counter!(names::FRAME_BYTES, "Relay frame bytes by direction");
    metrics::describe_counter!(
        names::RELAYED_TOTAL,
        "Events fanned out by the relay, by event name"
    );
    metrics::describe_counter!(
        names::POST_MUTATIONS_TOTAL,
        "Demo post creations and deletions"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Errors by kind");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new().with_http_listener(addr).install()?;

    info!(%addr, "Metrics server listening");
    Ok(())
}

/// Record a frame crossing a relay socket.
pub fn record_frame(bytes: usize, direction: &'static str) {
    counter!(names::FRAMES_TOTAL, "direction" => direction).increment(1);
    counter!(names::FRAME_BYTES, "direction" => direction).increment(bytes as u64);
}

/// Record an event fanned out to `recipients` sockets.
pub fn record_relayed(event: &str, recipients: usize) {
    counter!(names::RELAYED_TOTAL, "event" => event.to_string()).increment(recipients as u64);
}

/// Record a demo post mutation (`created` or `deleted`).
pub fn record_post_mutation(kind: &'static str) {
    counter!(names::POST_MUTATIONS_TOTAL, "kind" => kind).increment(1);
}

/// Record an error.
pub fn record_error(kind: &'static str) {
    counter!(names::ERRORS_TOTAL, "kind" => kind).increment(1);
}

/// Counts a relay socket as open for as long as it lives.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Record a new connection.
    #[must_use]
    pub fn new() -> Self {
        counter!(names::CONNECTIONS_TOTAL).increment(1);
        gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder() {
        let _guard = ConnectionMetricsGuard::new();
        record_frame(10, "inbound");
        record_relayed("post:created", 2);
        record_post_mutation("created");
        record_error("websocket");
    }
}
