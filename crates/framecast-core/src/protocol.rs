//! Client ↔ broker wire protocol.
//!
//! Every frame is a JSON object tagged by `type`. Event frames carry a
//! second tag, `event`. Inbound text is validated at the boundary by
//! [`ClientMessage::parse`] / [`ServerMessage::parse`], which tell apart the
//! failure modes the broker logs differently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notification::{NotificationDraft, NotificationRecord};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Why an inbound frame was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Not valid JSON.
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
    /// Valid JSON, but not an object.
    #[error("message is not a JSON object")]
    NotAnObject,
    /// Object without a string `type`.
    #[error("message has no type")]
    MissingType,
    /// `type` not part of the protocol.
    #[error("unknown message type: {0}")]
    UnknownType(String),
    /// `event` frame without a string `event`.
    #[error("event message has no event name")]
    MissingEvent,
    /// `event` name not part of the protocol.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    /// Known `type`, but fields do not match its shape.
    #[error("invalid fields for {kind} message: {source}")]
    InvalidFields {
        /// The frame's `type`.
        kind: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Client → broker
// ─────────────────────────────────────────────────────────────────────────────

/// Frames a peer sends to the broker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Declare the application identity of this connection.
    Register {
        /// Application ID; registration without one leaves the connection unregistered.
        #[serde(rename = "appId", default, skip_serializing_if = "Option::is_none")]
        app_id: Option<String>,
        /// Shared-secret key, checked against the App Registration table.
        #[serde(rename = "apiKey", default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
    },
    /// Application-level liveness probe.
    Ping,
    /// Answer to a broker `ping`.
    Pong,
    /// Producer event.
    Event(ClientEvent),
}

/// Producer events, tagged by `event`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Publish a notification to every connection.
    NewNotification {
        /// Producer app ID, used when the payload has no `source`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        /// Correlates the broker's `published` answer with this request.
        #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        /// Notification fields.
        payload: NotificationDraft,
    },
}

const CLIENT_TYPES: &[&str] = &["register", "ping", "pong", "event"];
const CLIENT_EVENTS: &[&str] = &["new_notification"];

impl ClientMessage {
    /// Parse one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
        let kind = message_kind(&value, CLIENT_TYPES)?;
        if kind == "event" {
            match value.get("event") {
                Some(Value::String(name)) if CLIENT_EVENTS.contains(&name.as_str()) => {}
                Some(Value::String(name)) => return Err(ProtocolError::UnknownEvent(name.clone())),
                _ => return Err(ProtocolError::MissingEvent),
            }
        }
        serde_json::from_value(value).map_err(|source| ProtocolError::InvalidFields { kind, source })
    }

    /// Build a `register` frame.
    pub fn register(app_id: impl Into<String>, api_key: Option<String>) -> Self {
        Self::Register {
            app_id: Some(app_id.into()),
            api_key,
        }
    }

    /// Build a `new_notification` event frame.
    pub fn new_notification(
        source: impl Into<String>,
        request_id: Option<String>,
        payload: NotificationDraft,
    ) -> Self {
        Self::Event(ClientEvent::NewNotification {
            source: Some(source.into()),
            request_id,
            payload,
        })
    }

    /// Serialize to a text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Broker → client
// ─────────────────────────────────────────────────────────────────────────────

/// Frames the broker sends to a peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent right after the upgrade.
    Welcome {
        /// Human-readable greeting.
        message: String,
    },
    /// Registration accepted.
    Registered {
        /// The app ID now bound to the connection.
        #[serde(rename = "appId")]
        app_id: String,
    },
    /// Application-level liveness probe.
    Ping,
    /// Answer to a client `ping`.
    Pong,
    /// A broadcast or replayed notification.
    Notification {
        /// The record.
        payload: NotificationRecord,
    },
    /// Sent to the producer only, after its event was published.
    Published {
        /// Echo of the event's `requestId`.
        #[serde(rename = "requestId")]
        request_id: String,
        /// The broker-built record.
        payload: NotificationRecord,
    },
    /// A request from this connection was refused.
    Error {
        /// What went wrong.
        message: String,
        /// Echo of the event's `requestId`, when there was one.
        #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

const SERVER_TYPES: &[&str] = &[
    "welcome",
    "registered",
    "ping",
    "pong",
    "notification",
    "published",
    "error",
];

impl ServerMessage {
    /// Parse one text frame received from the broker.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
        let kind = message_kind(&value, SERVER_TYPES)?;
        serde_json::from_value(value).map_err(|source| ProtocolError::InvalidFields { kind, source })
    }

    /// Serialize to a text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn message_kind(value: &Value, known: &[&str]) -> Result<String, ProtocolError> {
    let Some(object) = value.as_object() else {
        return Err(ProtocolError::NotAnObject);
    };
    match object.get("type") {
        Some(Value::String(kind)) if known.contains(&kind.as_str()) => Ok(kind.clone()),
        Some(Value::String(kind)) => Err(ProtocolError::UnknownType(kind.clone())),
        _ => Err(ProtocolError::MissingType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NotificationId, NotificationType};
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;

    fn record() -> NotificationRecord {
        NotificationRecord::from_draft(
            NotificationDraft::new("Order Placed", "Order #100 received", "success"),
            NotificationId::from("n-1"),
            "appA",
            Utc::now(),
        )
    }

    #[test]
    fn parse_register() {
        let msg = ClientMessage::parse(r#"{"type":"register","appId":"appA","apiKey":"k"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Register {
                app_id: Some("appA".into()),
                api_key: Some("k".into())
            }
        );
    }

    #[test]
    fn parse_register_without_app_id() {
        let msg = ClientMessage::parse(r#"{"type":"register"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Register {
                app_id: None,
                api_key: None
            }
        );
    }

    #[test]
    fn parse_ping_pong() {
        assert_eq!(ClientMessage::parse(r#"{"type":"ping"}"#).unwrap(), ClientMessage::Ping);
        assert_eq!(ClientMessage::parse(r#"{"type":"pong"}"#).unwrap(), ClientMessage::Pong);
    }

    #[test]
    fn parse_new_notification_event() {
        let text = json!({
            "type": "event",
            "event": "new_notification",
            "source": "appA",
            "requestId": "r1",
            "payload": {"title": "t", "description": "d", "type": "warning"}
        })
        .to_string();
        let msg = ClientMessage::parse(&text).unwrap();
        assert_matches!(
            msg,
            ClientMessage::Event(ClientEvent::NewNotification { source: Some(s), request_id: Some(r), payload })
                if s == "appA" && r == "r1" && payload.kind.as_deref() == Some("warning")
        );
    }

    #[test]
    fn parse_malformed() {
        assert_matches!(ClientMessage::parse("{not json"), Err(ProtocolError::Malformed(_)));
    }

    #[test]
    fn parse_not_object() {
        assert_matches!(ClientMessage::parse("[1,2]"), Err(ProtocolError::NotAnObject));
    }

    #[test]
    fn parse_missing_type() {
        assert_matches!(ClientMessage::parse(r#"{"appId":"x"}"#), Err(ProtocolError::MissingType));
        assert_matches!(ClientMessage::parse(r#"{"type":7}"#), Err(ProtocolError::MissingType));
    }

    #[test]
    fn parse_unknown_type() {
        assert_matches!(
            ClientMessage::parse(r#"{"type":"subscribe"}"#),
            Err(ProtocolError::UnknownType(t)) if t == "subscribe"
        );
    }

    #[test]
    fn parse_event_name_errors() {
        assert_matches!(
            ClientMessage::parse(r#"{"type":"event","event":"delete_all","payload":{}}"#),
            Err(ProtocolError::UnknownEvent(e)) if e == "delete_all"
        );
        assert_matches!(
            ClientMessage::parse(r#"{"type":"event","payload":{}}"#),
            Err(ProtocolError::MissingEvent)
        );
    }

    #[test]
    fn parse_invalid_fields() {
        assert_matches!(
            ClientMessage::parse(r#"{"type":"event","event":"new_notification"}"#),
            Err(ProtocolError::InvalidFields { kind, .. }) if kind == "event"
        );
        assert_matches!(
            ClientMessage::parse(r#"{"type":"register","appId":42}"#),
            Err(ProtocolError::InvalidFields { kind, .. }) if kind == "register"
        );
    }

    #[test]
    fn client_event_wire_shape() {
        let msg = ClientMessage::new_notification(
            "appA",
            None,
            NotificationDraft::new("t", "d", "info"),
        );
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["event"], "new_notification");
        assert_eq!(value["source"], "appA");
        assert!(value.get("requestId").is_none());
        assert_eq!(value["payload"]["title"], "t");
    }

    #[test]
    fn register_wire_shape() {
        let value: Value =
            serde_json::from_str(&ClientMessage::register("appB", None).to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "register", "appId": "appB"}));
    }

    #[test]
    fn server_messages_wire_shape() {
        let cases = [
            (ServerMessage::Ping, json!({"type": "ping"})),
            (ServerMessage::Pong, json!({"type": "pong"})),
            (
                ServerMessage::Registered { app_id: "appA".into() },
                json!({"type": "registered", "appId": "appA"}),
            ),
            (
                ServerMessage::Welcome { message: "hi".into() },
                json!({"type": "welcome", "message": "hi"}),
            ),
        ];
        for (msg, expected) in cases {
            let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn notification_message_carries_record() {
        let msg = ServerMessage::Notification { payload: record() };
        let text = msg.to_json().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "notification");
        assert_eq!(value["payload"]["id"], "n-1");
        assert_eq!(value["payload"]["type"], "success");

        let back = ServerMessage::parse(&text).unwrap();
        assert_matches!(back, ServerMessage::Notification { payload } if payload.kind == NotificationType::Success);
    }

    #[test]
    fn server_parse_unknown_type() {
        assert_matches!(
            ServerMessage::parse(r#"{"type":"shutdown"}"#),
            Err(ProtocolError::UnknownType(t)) if t == "shutdown"
        );
    }

    #[test]
    fn error_message_omits_missing_request_id() {
        let msg = ServerMessage::Error {
            message: "denied".into(),
            request_id: None,
        };
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "error", "message": "denied"}));
    }
}
