//! Peer client configuration.

use std::time::Duration;

use framecast_core::NotificationDraft;
use framecast_core::constants::HEARTBEAT_INTERVAL;
use framecast_core::retry::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_JITTER_FACTOR, DEFAULT_MAX_DELAY_MS, backoff_delay,
};

/// Reconnect schedule after a connection closes or fails to open.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Symmetric jitter, `0.0..=1.0`.
    pub jitter_factor: f64,
    /// Consecutive failed attempts before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            jitter_factor: DEFAULT_JITTER_FACTOR,
            max_attempts: Some(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32, random: f64) -> Duration {
        backoff_delay(
            attempt,
            self.base_delay,
            self.max_delay,
            self.jitter_factor,
            random,
        )
    }

    /// Whether `attempts` consecutive failures exhaust the policy.
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Options for [`PeerClient::init`](crate::PeerClient::init).
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Shared-secret app key sent on `register` and as `X-API-Key`.
    pub api_key: Option<String>,
    /// Broker base URL for the HTTP fallback, e.g. `http://127.0.0.1:3000`.
    pub dashboard_url: String,
    /// WebSocket URL; derived from `dashboard_url` when unset.
    pub ws_url: Option<String>,
    /// Connect from `init`.
    pub auto_connect: bool,
    /// Use the HTTP fallback when the connection is unavailable.
    pub fallback_mode: bool,
    /// Produce synthetic data when no broker is reachable.
    pub demo_mode: bool,
    /// Timeout for HTTP requests and the WebSocket handshake.
    pub request_timeout: Duration,
    /// Interval of the client's application-level `ping`.
    pub heartbeat_interval: Duration,
    /// How long `send_notification` waits for the broker's `published` answer.
    pub publish_ack_timeout: Duration,
    /// Interval between `GET /notifications` polls in degraded mode.
    pub poll_interval: Duration,
    /// Reconnect schedule.
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            dashboard_url: "http://127.0.0.1:3000".into(),
            ws_url: None,
            auto_connect: true,
            fallback_mode: true,
            demo_mode: false,
            request_timeout: Duration::from_secs(10),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            publish_ack_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientOptions {
    /// Defaults pointed at `dashboard_url`.
    pub fn new(dashboard_url: impl Into<String>) -> Self {
        Self {
            dashboard_url: dashboard_url.into(),
            ..Self::default()
        }
    }

    /// The WebSocket endpoint to dial.
    pub fn resolved_ws_url(&self) -> String {
        if let Some(url) = &self.ws_url {
            return url.clone();
        }
        format!(
            "{}/ws",
            http_to_ws_scheme(self.dashboard_url.trim_end_matches('/'))
        )
    }

    /// Base URL for HTTP requests, without a trailing slash.
    pub fn http_base(&self) -> &str {
        self.dashboard_url.trim_end_matches('/')
    }
}

/// Convert an HTTP(S) URL to WS(S) scheme. `ws://` and `wss://` pass through.
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_owned()
    }
}

/// Optional fields for [`PeerClient::send_notification`](crate::PeerClient::send_notification).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Producer-chosen id.
    pub id: Option<String>,
    /// Producer correlation id.
    pub source_id: Option<String>,
    /// Overrides the client's app id as `source`.
    pub source: Option<String>,
    /// Render `link` as an action.
    pub actionable: bool,
    /// Action target.
    pub link: Option<String>,
    /// Request an SMS side-channel dispatch to `sms_recipient`.
    pub sms_enabled: bool,
    /// SMS recipient.
    pub sms_recipient: Option<String>,
}

impl SendOptions {
    /// Build the draft sent to the broker.
    pub fn into_draft(
        self,
        title: &str,
        description: &str,
        kind: &str,
        app_id: &str,
    ) -> NotificationDraft {
        NotificationDraft {
            id: self.id,
            source: Some(self.source.unwrap_or_else(|| app_id.to_owned())),
            source_id: self.source_id,
            actionable: Some(self.actionable),
            link: self.link,
            sms_enabled: Some(self.sms_enabled),
            sms_recipient: self.sms_recipient,
            ..NotificationDraft::new(title, description, kind)
        }
    }
}
