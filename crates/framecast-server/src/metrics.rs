//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `GET /metrics`. Call once at startup
/// before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// A handle backed by a recorder that is not installed globally.
///
/// Renders an empty exposition; used by tests and embedders that do not
/// export metrics.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// Connections accepted (counter).
pub const CONNECTIONS_TOTAL: &str = "broker_connections_total";
/// Connections closed or terminated (counter).
pub const DISCONNECTIONS_TOTAL: &str = "broker_disconnections_total";
/// Currently open connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "broker_connections_active";
/// Notifications published (counter, labels: path).
pub const NOTIFICATIONS_PUBLISHED_TOTAL: &str = "broker_notifications_published_total";
/// Broadcast frames that could not be queued (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "broker_broadcast_drops_total";
/// Connections terminated by the heartbeat sweep (counter).
pub const HEARTBEAT_TERMINATIONS_TOTAL: &str = "broker_heartbeat_terminations_total";
/// SMS dispatch attempts (counter, labels: outcome).
pub const SMS_DISPATCH_TOTAL: &str = "broker_sms_dispatch_total";
