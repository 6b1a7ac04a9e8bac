//! Per-connection state owned by the Connection Registry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use framecast_core::{ConnectionId, ServerMessage};
use framecast_settings::AppPermission;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A frame queued for the connection's writer task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// JSON text frame.
    Text(Arc<String>),
    /// Transport-level ping.
    Ping,
    /// Close frame; the writer stops after sending it.
    Close,
}

/// Identity bound by a successful `register`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    /// Declared application id.
    pub app_id: String,
    /// Permissions of the supplied app key, `None` when no key was checked.
    pub permissions: Option<Vec<AppPermission>>,
}

/// A connected peer.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    registration: OnceLock<Registration>,
    tx: mpsc::Sender<Outbound>,
    /// When this connection was accepted.
    pub connected_at: Instant,
    is_alive: AtomicBool,
    dropped_messages: AtomicU64,
    cancel: CancellationToken,
}

impl ClientConnection {
    /// Create a connection whose termination token is a child of `parent`.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Outbound>, parent: &CancellationToken) -> Self {
        Self {
            id,
            registration: OnceLock::new(),
            tx,
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            dropped_messages: AtomicU64::new(0),
            cancel: parent.child_token(),
        }
    }

    /// Create a connection plus the receiving end of its outbound queue.
    pub fn channel(
        queue_size: usize,
        parent: &CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        (Arc::new(Self::new(ConnectionId::new(), tx, parent)), rx)
    }

    /// Bind the registration. Returns `false` if one was already bound.
    pub fn bind(&self, registration: Registration) -> bool {
        self.registration.set(registration).is_ok()
    }

    /// The bound registration, if any.
    pub fn registration(&self) -> Option<&Registration> {
        self.registration.get()
    }

    /// Declared application id, empty until registration.
    pub fn app_id(&self) -> Option<&str> {
        self.registration.get().map(|r| r.app_id.as_str())
    }

    /// Whether this connection may publish.
    ///
    /// Connections registered without an app key are unrestricted.
    pub fn can_publish(&self) -> bool {
        self.registration
            .get()
            .and_then(|r| r.permissions.as_ref())
            .is_none_or(|p| p.contains(&AppPermission::Publish))
    }

    /// Queue a frame for the writer task.
    ///
    /// Returns `false` if the queue is full or closed, and increments the
    /// dropped message counter.
    pub fn send(&self, frame: Outbound) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Queue pre-serialized JSON text.
    pub fn send_text(&self, text: Arc<String>) -> bool {
        self.send(Outbound::Text(text))
    }

    /// Serialize and queue a protocol message.
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        match message.to_json() {
            Ok(json) => self.send_text(Arc::new(json)),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to serialize message");
                false
            }
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Whether the connection answered since the last heartbeat check.
    pub fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::Relaxed)
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Stop the connection's reader and writer tasks.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    /// Whether [`terminate`](Self::terminate) was called (or the server is shutting down).
    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled on termination.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
