//! Peer client error types.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors from the connection path or the HTTP fallback.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Called outside a tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,
    /// WebSocket handshake or transport failure.
    #[error("websocket connect failed: {0}")]
    Connect(#[source] Box<tungstenite::Error>),
    /// No open connection to send on.
    #[error("not connected")]
    NotConnected,
    /// The connection dropped before the broker answered.
    #[error("connection closed before the broker answered")]
    ConnectionClosed,
    /// Gave up waiting.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    /// The broker refused the notification.
    #[error("broker rejected notification: {0}")]
    Rejected(String),
    /// HTTP transport failure.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success HTTP status.
    #[error("http {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// Could not encode a frame.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether the notification certainly never reached the broker, so the
    /// HTTP fallback may be tried without risking a duplicate.
    pub fn is_undelivered(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Encode(_))
    }
}

impl From<tungstenite::Error> for ClientError {
    fn from(e: tungstenite::Error) -> Self {
        Self::Connect(Box::new(e))
    }
}
