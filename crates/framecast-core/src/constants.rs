//! Protocol-wide defaults shared by broker and client.

use std::time::Duration;

/// Interval between heartbeat sweeps on the broker, and between client self-pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Number of recent notifications kept in the history buffer.
pub const HISTORY_CAPACITY: usize = 100;

/// Greeting sent to every connection right after the upgrade.
pub const WELCOME_MESSAGE: &str = "Connected to framecast notification broker";

/// `source` used for records published over HTTP without a producer identity.
pub const DEFAULT_HTTP_SOURCE: &str = "api";

/// Header carrying a shared-secret app key on fallback requests.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the producer's app ID on fallback requests.
pub const APP_ID_HEADER: &str = "x-app-id";
