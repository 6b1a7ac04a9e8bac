//! Broker network and runtime settings.

use serde::{Deserialize, Serialize};

/// Broker network and runtime settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP + WebSocket port.
    pub port: u16,
    /// Heartbeat sweep interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Number of recent notifications replayed to new registrations.
    pub history_capacity: usize,
    /// Per-connection outbound queue depth; frames beyond it are dropped.
    pub send_queue_size: usize,
    /// Largest accepted inbound WebSocket frame, in bytes.
    pub max_message_bytes: usize,
    /// How long shutdown waits for background tasks, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// Answer CORS preflights from any origin (embedded widgets).
    pub cors_allow_any: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            heartbeat_interval_ms: 30_000,
            history_capacity: 100,
            send_queue_size: 256,
            max_message_bytes: 64 * 1024,
            shutdown_timeout_ms: 5_000,
            cors_allow_any: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.port, 3000);
        assert_eq!(s.heartbeat_interval_ms, 30_000);
        assert_eq!(s.history_capacity, 100);
        assert!(s.cors_allow_any);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: ServerSettings = serde_json::from_str(r#"{"port": 4000}"#).unwrap();
        assert_eq!(s.port, 4000);
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.send_queue_size, 256);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(ServerSettings::default()).unwrap();
        assert_eq!(json["heartbeatIntervalMs"], 30_000);
        assert_eq!(json["historyCapacity"], 100);
    }
}
