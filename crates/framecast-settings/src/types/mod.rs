//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a settings file only needs the keys it changes.

mod auth;
mod logging;
mod server;
mod sms;

pub use auth::*;
pub use logging::*;
pub use server::*;
pub use sms::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for the framecast broker.
///
/// ```json
/// {
///   "server": { "port": 4000 },
///   "auth": { "keys": { "secret": { "name": "orders-app" } } },
///   "sms": { "enabled": true, "accountSid": "AC..." }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FramecastSettings {
    /// Network and runtime settings.
    pub server: ServerSettings,
    /// App Registration table.
    pub auth: AuthSettings,
    /// SMS side channel.
    pub sms: SmsSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl FramecastSettings {
    /// Reject values the broker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalMs must be positive".to_string(),
            ));
        }
        if self.server.history_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.historyCapacity must be at least 1".to_string(),
            ));
        }
        if self.server.send_queue_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueSize must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
