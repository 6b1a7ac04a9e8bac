//! SMS side-channel settings.

use serde::{Deserialize, Serialize};

/// SMS provider credentials and switches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmsSettings {
    /// Dispatch SMS for notifications that request it.
    pub enabled: bool,
    /// Provider API base URL.
    pub base_url: String,
    /// Provider account identifier.
    pub account_sid: String,
    /// Provider auth token.
    pub auth_token: String,
    /// Sender phone number.
    pub from_number: String,
    /// Provider request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.twilio.com".to_string(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            timeout_ms: 10_000,
        }
    }
}

impl SmsSettings {
    /// Whether all credentials needed to reach the provider are present.
    pub fn has_credentials(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_number.is_empty()
    }
}
