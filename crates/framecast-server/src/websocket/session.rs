//! WebSocket session lifecycle: one accepted peer from upgrade to disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use framecast_core::ServerMessage;
use framecast_core::constants::WELCOME_MESSAGE;
use futures::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::connection::Outbound;
use super::handler::handle_text;
use crate::broker::Broker;

/// Run a session for an upgraded socket.
///
/// 1. Adds the connection to the registry and queues the welcome message
/// 2. Forwards queued frames to the socket from a writer task
/// 3. Dispatches inbound text frames and records transport pongs
/// 4. Removes the connection once the peer goes away or it is terminated
#[instrument(skip_all)]
pub async fn handle_socket(
    socket: WebSocket,
    broker: Arc<Broker>,
    shutdown: CancellationToken,
    queue_size: usize,
) {
    let (conn, mut rx) = broker.open_connection(queue_size, &shutdown);
    let conn_id = conn.id.clone();
    info!(conn_id = %conn_id, "client connected");

    let _ = conn.send_message(&ServerMessage::Welcome {
        message: WELCOME_MESSAGE.to_string(),
    });

    let (mut ws_tx, mut ws_rx) = socket.split();
    let cancel = conn.cancel_token();

    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                frame = rx.recv() => {
                    let result = match frame {
                        Some(Outbound::Text(text)) => ws_tx.send(Message::Text(text.as_str().into())).await,
                        Some(Outbound::Ping) => ws_tx.send(Message::Ping(Vec::new().into())).await,
                        Some(Outbound::Close) | None => {
                            let _ = ws_tx.send(Message::Close(None)).await;
                            break;
                        }
                    };
                    if result.is_err() {
                        break;
                    }
                }
                () = writer_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        writer_cancel.cancel();
    });

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = cancel.cancelled() => break,
        };
        match frame {
            Some(Ok(Message::Text(text))) => handle_text(&broker, &conn, text.as_str()),
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => handle_text(&broker, &conn, text),
                Err(_) => debug!(conn_id = %conn_id, len = data.len(), "ignoring non-UTF8 binary frame"),
            },
            Some(Ok(Message::Pong(_))) => conn.mark_alive(),
            Some(Ok(Message::Ping(_))) => {}
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
        }
    }

    conn.terminate();
    let _ = writer.await;
    let _ = broker.remove(&conn_id);
    info!(conn_id = %conn_id, age_secs = conn.age().as_secs(), dropped = conn.drop_count(), "client disconnected");
}
