//! The Broker: Connection Registry, History Buffer and Message Router.
//!
//! Registry and history live behind one lock so a broadcast never races a
//! registration's history replay. Every send is a non-blocking queue push;
//! the lock is never held across an await.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use framecast_core::constants::DEFAULT_HTTP_SOURCE;
use framecast_core::{ConnectionId, NotificationDraft, NotificationRecord, ServerMessage};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::{AppRegistry, KeyCheck, check_key};
use crate::history::HistoryBuffer;
use crate::metrics::{
    BROADCAST_DROPS_TOTAL, CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL, DISCONNECTIONS_TOTAL,
    HEARTBEAT_TERMINATIONS_TOTAL, NOTIFICATIONS_PUBLISHED_TOTAL, SMS_DISPATCH_TOTAL,
};
use crate::sms::{DisabledSmsSender, SmsSender};
use crate::websocket::connection::{ClientConnection, Outbound, Registration};

/// Which surface a notification arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishPath {
    /// `event` frame on an open connection.
    Connection,
    /// `POST /notifications`.
    Http,
}

impl PublishPath {
    /// Metric label value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Http => "http",
        }
    }
}

/// Why a publish was refused. Nothing is mutated when this is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    /// `title`, `description` or `type` absent or empty.
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// Outcome of a `register` message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Bound, acknowledged, and history replayed.
    Registered {
        /// The bound app id.
        app_id: String,
        /// Number of history records queued for replay.
        replayed: usize,
    },
    /// No app id supplied; the connection stays open and unregistered.
    MissingAppId,
    /// The connection already has an app id; it is left unchanged.
    AlreadyRegistered {
        /// The existing app id.
        app_id: String,
    },
    /// Unknown app key; the connection was terminated.
    Rejected,
    /// The connection is no longer in the registry.
    UnknownConnection,
}

/// Result of one Heartbeat Monitor pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections that were alive and got pinged.
    pub pinged: usize,
    /// Connections that missed the previous ping and were removed.
    pub terminated: Vec<ConnectionId>,
}

struct BrokerState {
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
    history: HistoryBuffer,
}

/// Owns the registry and history; the only component that mutates them.
pub struct Broker {
    state: Mutex<BrokerState>,
    apps: Option<AppRegistry>,
    sms: Arc<dyn SmsSender>,
}

impl Broker {
    /// Empty broker keeping `history_capacity` recent records.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            state: Mutex::new(BrokerState {
                connections: HashMap::new(),
                history: HistoryBuffer::new(history_capacity),
            }),
            apps: None,
            sms: Arc::new(DisabledSmsSender),
        }
    }

    /// Enable app key checks.
    #[must_use]
    pub fn with_app_registry(mut self, apps: Option<AppRegistry>) -> Self {
        self.apps = apps;
        self
    }

    /// Use `sender` for the SMS side channel.
    #[must_use]
    pub fn with_sms_sender(mut self, sender: Arc<dyn SmsSender>) -> Self {
        self.sms = sender;
        self
    }

    /// Configured App Registration table.
    pub fn app_registry(&self) -> Option<&AppRegistry> {
        self.apps.as_ref()
    }

    // ── Connection Registry ─────────────────────────────────────────

    /// Create a connection, add it to the registry, and return its queue.
    ///
    /// The queue holds at least the registration ack, a full history replay
    /// and one live frame, so `queue_size` below that is raised.
    pub fn open_connection(
        &self,
        queue_size: usize,
        parent: &CancellationToken,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Outbound>) {
        let replay_depth = self.state.lock().history.capacity() + 2;
        let (conn, rx) = ClientConnection::channel(queue_size.max(replay_depth), parent);
        self.add(Arc::clone(&conn));
        (conn, rx)
    }

    /// Add a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let count = {
            let mut state = self.state.lock();
            let _ = state.connections.insert(connection.id.clone(), connection);
            state.connections.len()
        };
        metrics::counter!(CONNECTIONS_TOTAL).increment(1);
        set_active_gauge(count);
    }

    /// Remove a connection. Removal is the only way it stops receiving broadcasts.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        let (removed, count) = {
            let mut state = self.state.lock();
            let removed = state.connections.remove(id);
            (removed, state.connections.len())
        };
        if removed.is_some() {
            metrics::counter!(DISCONNECTIONS_TOTAL).increment(1);
            set_active_gauge(count);
        }
        removed
    }

    /// Look up a connection.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.state.lock().connections.get(id).cloned()
    }

    /// Visit every open connection.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<ClientConnection>)) {
        let state = self.state.lock();
        for conn in state.connections.values() {
            f(conn);
        }
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    // ── Message Router ──────────────────────────────────────────────

    /// Bind an app id to a connection, acknowledge, and replay history.
    ///
    /// When `api_key` is supplied and an App Registration table is
    /// configured, an unknown key terminates the connection.
    pub fn register(
        &self,
        conn_id: &ConnectionId,
        app_id: Option<String>,
        api_key: Option<&str>,
    ) -> RegisterOutcome {
        let state = self.state.lock();
        let Some(conn) = state.connections.get(conn_id).cloned() else {
            return RegisterOutcome::UnknownConnection;
        };

        let Some(app_id) = app_id.filter(|a| !a.is_empty()) else {
            warn!(conn_id = %conn_id, "register without appId, connection left unregistered");
            return RegisterOutcome::MissingAppId;
        };

        if let Some(existing) = conn.app_id() {
            warn!(conn_id = %conn_id, app_id = existing, requested = %app_id, "connection already registered, ignoring");
            return RegisterOutcome::AlreadyRegistered {
                app_id: existing.to_owned(),
            };
        }

        let permissions = match check_key(self.apps.as_ref(), api_key) {
            KeyCheck::Unchecked => None,
            KeyCheck::Known(key) => Some(key.permissions.clone()),
            KeyCheck::Unknown => {
                drop(state);
                warn!(conn_id = %conn_id, app_id = %app_id, "unknown app key, terminating connection");
                let _ = conn.send_message(&ServerMessage::Error {
                    message: "Invalid API key".to_string(),
                    request_id: None,
                });
                self.terminate(&conn);
                return RegisterOutcome::Rejected;
            }
        };

        if !conn.bind(Registration {
            app_id: app_id.clone(),
            permissions,
        }) {
            let existing = conn.app_id().unwrap_or_default().to_owned();
            return RegisterOutcome::AlreadyRegistered { app_id: existing };
        }

        let _ = conn.send_message(&ServerMessage::Registered {
            app_id: app_id.clone(),
        });
        let mut replayed = 0;
        for record in state.history.iter() {
            if conn.send_message(&ServerMessage::Notification {
                payload: record.clone(),
            }) {
                replayed += 1;
            }
        }
        drop(state);

        info!(conn_id = %conn_id, app_id = %app_id, replayed, "connection registered");
        RegisterOutcome::Registered { app_id, replayed }
    }

    /// Build a record, append it to history, and broadcast it to every open connection.
    ///
    /// `producer` is the app id used when the draft has no `source`; it
    /// falls back to `"api"`. Delivery is fire-and-forget: a connection whose
    /// queue is full or closed is logged and skipped.
    pub fn publish(
        &self,
        draft: NotificationDraft,
        producer: Option<&str>,
        path: PublishPath,
    ) -> Result<NotificationRecord, PublishError> {
        let missing = draft.missing_required_fields();
        if !missing.is_empty() {
            return Err(PublishError::MissingFields(missing));
        }

        let source = producer
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_HTTP_SOURCE);

        let (record, recipients, dropped) = {
            let mut state = self.state.lock();
            let id = state.history.fresh_id(draft.id.as_deref());
            let timestamp = state.history.next_timestamp(Utc::now());
            let record = NotificationRecord::from_draft(draft, id, source, timestamp);
            let _ = state.history.push(record.clone());

            let message = ServerMessage::Notification {
                payload: record.clone(),
            };
            let (recipients, dropped) = match message.to_json() {
                Ok(json) => broadcast(&state.connections, &Arc::new(json), &record),
                Err(e) => {
                    error!(notification_id = %record.id, error = %e, "failed to serialize notification");
                    (0, 0)
                }
            };
            (record, recipients, dropped)
        };

        metrics::counter!(NOTIFICATIONS_PUBLISHED_TOTAL, "path" => path.as_str()).increment(1);
        if dropped > 0 {
            metrics::counter!(BROADCAST_DROPS_TOTAL).increment(dropped as u64);
        }
        info!(
            notification_id = %record.id,
            source = %record.source,
            kind = %record.kind,
            path = path.as_str(),
            recipients,
            dropped,
            "notification published"
        );

        self.dispatch_sms(&record);
        Ok(record)
    }

    /// History Buffer contents, newest first.
    pub fn list_history(&self) -> Vec<NotificationRecord> {
        self.state.lock().history.newest_first()
    }

    /// Number of buffered records.
    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    // ── Heartbeat Monitor ───────────────────────────────────────────

    /// One heartbeat pass.
    ///
    /// A connection that has not answered since the previous pass is
    /// terminated and removed; every other connection is marked not-alive
    /// and sent a transport ping plus an application `{type:"ping"}`.
    pub fn sweep(&self) -> SweepReport {
        let ping = ServerMessage::Ping.to_json().ok().map(Arc::new);
        let mut report = SweepReport::default();

        let count = {
            let mut state = self.state.lock();
            for conn in state.connections.values() {
                if conn.check_alive() {
                    let _ = conn.send(Outbound::Ping);
                    if let Some(ping) = &ping {
                        let _ = conn.send_text(Arc::clone(ping));
                    }
                    report.pinged += 1;
                } else {
                    report.terminated.push(conn.id.clone());
                }
            }
            for id in &report.terminated {
                if let Some(conn) = state.connections.remove(id) {
                    let _ = conn.send(Outbound::Close);
                    conn.terminate();
                }
            }
            state.connections.len()
        };

        if !report.terminated.is_empty() {
            let n = report.terminated.len() as u64;
            metrics::counter!(HEARTBEAT_TERMINATIONS_TOTAL).increment(n);
            metrics::counter!(DISCONNECTIONS_TOTAL).increment(n);
            set_active_gauge(count);
            for id in &report.terminated {
                info!(conn_id = %id, "terminated unresponsive connection");
            }
        }
        debug!(pinged = report.pinged, terminated = report.terminated.len(), "heartbeat sweep");
        report
    }

    /// Close every connection (server shutdown).
    pub fn close_all(&self) {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.connections.drain().map(|(_, c)| c).collect()
        };
        for conn in &drained {
            let _ = conn.send(Outbound::Close);
            conn.terminate();
        }
        set_active_gauge(0);
        if !drained.is_empty() {
            info!(closed = drained.len(), "closed all connections");
        }
    }

    fn terminate(&self, conn: &ClientConnection) {
        let _ = conn.send(Outbound::Close);
        conn.terminate();
        let _ = self.remove(&conn.id);
    }

    fn dispatch_sms(&self, record: &NotificationRecord) {
        let Some(to) = record.sms_target() else {
            return;
        };
        if !self.sms.is_enabled() {
            debug!(notification_id = %record.id, "sms requested but bridge disabled");
            metrics::counter!(SMS_DISPATCH_TOTAL, "outcome" => "disabled").increment(1);
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(notification_id = %record.id, "no async runtime, skipping sms dispatch");
            return;
        };

        let sms = Arc::clone(&self.sms);
        let to = to.to_owned();
        let body = record.sms_body();
        let notification_id = record.id.clone();
        let _ = runtime.spawn(async move {
            match sms.send(&to, &body).await {
                Ok(receipt) => {
                    metrics::counter!(SMS_DISPATCH_TOTAL, "outcome" => "sent").increment(1);
                    info!(%notification_id, message_id = %receipt.message_id, "sms dispatched");
                }
                Err(e) => {
                    metrics::counter!(SMS_DISPATCH_TOTAL, "outcome" => "failed").increment(1);
                    warn!(%notification_id, error = %e, "sms dispatch failed");
                }
            }
        });
    }
}

fn broadcast(
    connections: &HashMap<ConnectionId, Arc<ClientConnection>>,
    json: &Arc<String>,
    record: &NotificationRecord,
) -> (usize, usize) {
    let mut dropped = 0;
    for conn in connections.values() {
        if !conn.send_text(Arc::clone(json)) {
            dropped += 1;
            warn!(conn_id = %conn.id, notification_id = %record.id, "failed to send notification to client");
        }
    }
    (connections.len(), dropped)
}

#[allow(clippy::cast_precision_loss)]
fn set_active_gauge(count: usize) {
    metrics::gauge!(CONNECTIONS_ACTIVE).set(count as f64);
}
