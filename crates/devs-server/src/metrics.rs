//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Fails if a
/// recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Side-channel requests dispatched (counter, labels: tag).
pub const SIDE_REQUESTS_TOTAL: &str = "side_requests_total";
/// Side-channel requests answered with an error (counter, labels: tag, error_type).
pub const SIDE_ERRORS_TOTAL: &str = "side_errors_total";
/// Handler duration (histogram, labels: tag).
pub const SIDE_REQUEST_DURATION_SECONDS: &str = "side_request_duration_seconds";
/// Frames dropped because they could not be decoded (counter).
pub const SIDE_FRAMES_DROPPED_TOTAL: &str = "side_frames_dropped_total";
/// Raw frames relayed to side-channel subscribers (counter).
pub const SIDE_RELAYED_TOTAL: &str = "side_relayed_total";
/// WebSocket connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Connections refused over the connection limit (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Outbound messages dropped on a full or closed queue (counter).
pub const WS_SEND_DROPS_TOTAL: &str = "ws_send_drops_total";
/// Builds completed (counter, labels: outcome).
pub const BUILDS_TOTAL: &str = "builds_total";
/// Active watch sessions (gauge).
pub const WATCH_SESSIONS_ACTIVE: &str = "watch_sessions_active";
