//! Server configuration.

use std::time::Duration;

use framecast_core::constants::{HEARTBEAT_INTERVAL, HISTORY_CAPACITY};
use framecast_settings::ServerSettings;

/// Configuration for the broker server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Heartbeat sweep interval.
    pub heartbeat_interval: Duration,
    /// History Buffer capacity.
    pub history_capacity: usize,
    /// Per-connection outbound queue depth.
    pub send_queue_size: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for background tasks.
    pub shutdown_timeout: Duration,
    /// Permissive CORS for browser widgets.
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            history_capacity: HISTORY_CAPACITY,
            send_queue_size: 256,
            max_message_size: 64 * 1024,
            shutdown_timeout: Duration::from_secs(5),
            cors_allow_any: true,
        }
    }
}

impl ServerConfig {
    /// Build from the `server` settings section.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms),
            history_capacity: settings.history_capacity,
            send_queue_size: settings.send_queue_size,
            max_message_size: settings.max_message_bytes,
            shutdown_timeout: Duration::from_millis(settings.shutdown_timeout_ms),
            cors_allow_any: settings.cors_allow_any,
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_auto_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn default_heartbeat_and_history() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(cfg.history_capacity, 100);
    }

    #[test]
    fn from_settings_converts_units() {
        let settings = ServerSettings {
            host: "0.0.0.0".into(),
            port: 4000,
            heartbeat_interval_ms: 1500,
            history_capacity: 7,
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:4000");
        assert_eq!(cfg.heartbeat_interval, Duration::from_millis(1500));
        assert_eq!(cfg.history_capacity, 7);
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(5));
    }
}
