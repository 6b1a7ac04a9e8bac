//! Inbound frame dispatch for one connection.

use framecast_core::{ClientEvent, ClientMessage, ProtocolError, ServerMessage};
use tracing::{debug, warn};

use crate::broker::{Broker, PublishPath};
use crate::websocket::connection::ClientConnection;

/// Handle one text frame received on `conn`.
///
/// Malformed frames and unknown message types are logged and dropped; the
/// connection stays open.
pub fn handle_text(broker: &Broker, conn: &ClientConnection, text: &str) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(ProtocolError::UnknownType(kind)) => {
            warn!(conn_id = %conn.id, kind, "ignoring unknown message type");
            return;
        }
        Err(e) => {
            warn!(conn_id = %conn.id, error = %e, "ignoring malformed message");
            return;
        }
    };

    match message {
        ClientMessage::Register { app_id, api_key } => {
            let outcome = broker.register(&conn.id, app_id, api_key.as_deref());
            debug!(conn_id = %conn.id, ?outcome, "register handled");
        }
        ClientMessage::Ping => {
            let _ = conn.send_message(&ServerMessage::Pong);
        }
        ClientMessage::Pong => conn.mark_alive(),
        ClientMessage::Event(ClientEvent::NewNotification {
            source,
            request_id,
            payload,
        }) => {
            if !conn.can_publish() {
                warn!(conn_id = %conn.id, app_id = conn.app_id(), "publish denied for app key");
                reply_error(conn, request_id, "app key lacks publish permission");
                return;
            }

            let producer = source
                .as_deref()
                .filter(|s| !s.is_empty())
                .or_else(|| conn.app_id());
            match broker.publish(payload, producer, PublishPath::Connection) {
                Ok(record) => {
                    if let Some(request_id) = request_id {
                        let _ = conn.send_message(&ServerMessage::Published {
                            request_id,
                            payload: record,
                        });
                    }
                }
                Err(e) => {
                    warn!(conn_id = %conn.id, error = %e, "rejected notification");
                    reply_error(conn, request_id, &e.to_string());
                }
            }
        }
    }
}

fn reply_error(conn: &ClientConnection, request_id: Option<String>, message: &str) {
    // Without a request id the producer has nothing to correlate against.
    if request_id.is_some() {
        let _ = conn.send_message(&ServerMessage::Error {
            message: message.to_owned(),
            request_id,
        });
    }
}
