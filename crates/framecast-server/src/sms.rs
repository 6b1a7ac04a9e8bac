//! SMS Bridge: best-effort text message side channel.
//!
//! Dispatch never affects broadcast delivery; the broker spawns it after
//! fan-out and only logs and counts the result.

use std::time::Duration;

use async_trait::async_trait;
use framecast_settings::SmsSettings;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// E.164 phone number, optional leading `+`.
const E164_PATTERN: &str = r"^\+?[1-9]\d{1,14}$";

/// SMS dispatch errors.
#[derive(Debug, Error)]
pub enum SmsError {
    /// The bridge is disabled or lacks credentials.
    #[error("sms bridge not configured")]
    NotConfigured,
    /// Recipient is not an E.164 number.
    #[error("invalid phone number: {0}")]
    InvalidRecipient(String),
    /// Provider answered with a non-success status.
    #[error("sms provider returned {status}: {body}")]
    Provider {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Transport failure talking to the provider.
    #[error("sms request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Recipient pattern failed to compile.
    #[error("invalid recipient pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Provider acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmsReceipt {
    /// Provider message id.
    pub message_id: String,
}

/// Sends one text message.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Whether dispatch should be attempted at all.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Send `body` to `to`.
    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, SmsError>;
}

/// Sender used when SMS is switched off.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledSmsSender;

#[async_trait]
impl SmsSender for DisabledSmsSender {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn send(&self, _to: &str, _body: &str) -> Result<SmsReceipt, SmsError> {
        Err(SmsError::NotConfigured)
    }
}

/// Twilio REST sender.
#[derive(Debug)]
pub struct TwilioSmsSender {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    recipient_pattern: Regex,
}

#[derive(Deserialize)]
struct MessageResource {
    sid: String,
}

impl TwilioSmsSender {
    /// Build from settings. Fails when credentials are missing.
    pub fn new(settings: &SmsSettings) -> Result<Self, SmsError> {
        if !settings.has_credentials() {
            return Err(SmsError::NotConfigured);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            account_sid: settings.account_sid.clone(),
            auth_token: settings.auth_token.clone(),
            from_number: settings.from_number.clone(),
            recipient_pattern: Regex::new(E164_PATTERN)?,
        })
    }

    /// Validate a recipient and add the `+` prefix if missing.
    pub fn normalize_recipient(&self, raw: &str) -> Result<String, SmsError> {
        let trimmed = raw.trim();
        if !self.recipient_pattern.is_match(trimmed) {
            return Err(SmsError::InvalidRecipient(raw.to_string()));
        }
        Ok(if trimmed.starts_with('+') {
            trimmed.to_string()
        } else {
            format!("+{trimmed}")
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, SmsError> {
        let to = self.normalize_recipient(to)?;
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", to.as_str()),
                ("From", self.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SmsError::Provider {
                status: status.as_u16(),
                body,
            });
        }
        let resource: MessageResource = response.json().await?;
        Ok(SmsReceipt {
            message_id: resource.sid,
        })
    }
}

/// Build the sender the settings ask for, falling back to disabled.
pub fn sender_from_settings(settings: &SmsSettings) -> Result<Box<dyn SmsSender>, SmsError> {
    if settings.enabled {
        Ok(Box::new(TwilioSmsSender::new(settings)?))
    } else {
        Ok(Box::new(DisabledSmsSender))
    }
}
