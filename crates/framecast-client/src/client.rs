//! `PeerClient`: one application's connection to the broker.
//!
//! A background driver task owns the WebSocket. It dials, registers, pumps
//! frames until the connection drops, then sleeps per the reconnect policy
//! and dials again. A socket that closes before the broker acknowledges
//! registration counts as a failed attempt. When the policy is exhausted and fallback mode is on,
//! the driver switches to polling `GET /notifications`. Callers talk to the
//! driver only through shared state: the outbound queue of the current
//! connection, the pending publish acknowledgements, and the state cell.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use framecast_core::{ClientMessage, NotificationRecord, ServerMessage};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::demo;
use crate::errors::ClientError;
use crate::fallback::FallbackGateway;
use crate::inbox::{Inbox, InboxEntry};
use crate::listeners::{Disposer, ListenerRegistry};
use crate::options::{ClientOptions, SendOptions};
use crate::state::{ConnectionState, StateCell};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Hook = Arc<dyn Fn() + Send + Sync>;
type PendingAck = oneshot::Sender<Result<NotificationRecord, String>>;

const OUTBOUND_QUEUE: usize = 64;
const INBOX_CAPACITY: usize = framecast_core::constants::HISTORY_CAPACITY;

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle hooks
// ─────────────────────────────────────────────────────────────────────────────

/// Callbacks for connection lifecycle transitions.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    on_connect: Option<Hook>,
    on_disconnect: Option<Hook>,
    on_fallback: Option<Hook>,
}

impl LifecycleHooks {
    /// No hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once the broker acknowledges registration on a new connection.
    #[must_use]
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Called when a registered connection closes.
    #[must_use]
    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Called when reconnects are exhausted and polling starts.
    #[must_use]
    pub fn on_fallback(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_fallback = Some(Arc::new(f));
        self
    }
}

fn fire(hook: Option<&Hook>) {
    if let Some(hook) = hook {
        hook();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared state
// ─────────────────────────────────────────────────────────────────────────────

struct Driver {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    app_id: String,
    options: ClientOptions,
    hooks: LifecycleHooks,
    state: StateCell,
    polling: AtomicBool,
    listeners: Arc<ListenerRegistry>,
    inbox: Mutex<Inbox>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    pending: Mutex<HashMap<String, PendingAck>>,
    gateway: FallbackGateway,
    driver: Mutex<Option<Driver>>,
}

impl Inner {
    /// Record a notification and notify listeners, unless its id was already seen.
    fn deliver(&self, record: NotificationRecord) {
        if !self.inbox.lock().push(record.clone()) {
            debug!(notification_id = %record.id, "skipping already delivered notification");
            return;
        }
        let _ = self.listeners.emit(&record);
    }

    /// Returns `true` when the message is the broker's registration ack.
    fn handle_server_text(&self, text: &str, outbound: &mpsc::Sender<String>) -> bool {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(app_id = %self.app_id, error = %e, "ignoring unreadable broker message");
                return false;
            }
        };
        match message {
            ServerMessage::Notification { payload } => self.deliver(payload),
            ServerMessage::Ping => {
                if let Ok(pong) = ClientMessage::Pong.to_json() {
                    let _ = outbound.try_send(pong);
                }
            }
            ServerMessage::Published {
                request_id,
                payload,
            } => {
                if let Some(ack) = self.pending.lock().remove(&request_id) {
                    let _ = ack.send(Ok(payload));
                }
            }
            ServerMessage::Error {
                message,
                request_id,
            } => {
                warn!(app_id = %self.app_id, error = %message, "broker reported an error");
                if let Some(ack) = request_id.and_then(|id| self.pending.lock().remove(&id)) {
                    let _ = ack.send(Err(message));
                }
            }
            ServerMessage::Registered { app_id } => {
                info!(%app_id, "registered with broker");
                return true;
            }
            ServerMessage::Welcome { message } => debug!(%message, "broker greeting"),
            ServerMessage::Pong => debug!("broker pong"),
        }
        false
    }

    async fn poll_once(&self) {
        match self.gateway.history().await {
            Ok(records) => {
                for record in records.into_iter().rev() {
                    self.deliver(record);
                }
            }
            Err(e) => warn!(app_id = %self.app_id, error = %e, "polling for notifications failed"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

#[instrument(skip_all, fields(app_id = %inner.app_id))]
async fn drive(inner: Arc<Inner>, cancel: CancellationToken) {
    let url = inner.options.resolved_ws_url();
    let mut failures: u32 = 0;

    loop {
        let _ = inner.state.set(ConnectionState::Connecting);
        let dial = tokio::select! {
            result = tokio::time::timeout(inner.options.request_timeout, connect_async(url.as_str())) => result,
            () = cancel.cancelled() => break,
        };
        match dial {
            Ok(Ok((ws, _response))) => {
                if run_session(&inner, ws, &cancel).await {
                    failures = 0;
                } else {
                    failures += 1;
                    warn!(%url, attempt = failures, "connection closed before registration");
                }
            }
            Ok(Err(e)) => {
                failures += 1;
                warn!(%url, error = %e, attempt = failures, "connection attempt failed");
            }
            Err(_) => {
                failures += 1;
                warn!(%url, attempt = failures, "connection attempt timed out");
            }
        }
        let _ = inner.state.set(ConnectionState::Disconnected);

        if cancel.is_cancelled() {
            break;
        }
        if inner.options.reconnect.exhausted(failures) {
            if inner.options.fallback_mode {
                info!(attempts = failures, "reconnect attempts exhausted, polling for notifications");
                poll(&inner, &cancel).await;
            } else {
                warn!(attempts = failures, "reconnect attempts exhausted");
            }
            break;
        }

        let delay = inner
            .options
            .reconnect
            .delay(failures.saturating_sub(1), rand::random::<f64>());
        debug!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "reconnecting");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => break,
        }
    }
    let _ = inner.state.set(ConnectionState::Disconnected);
}

/// Runs one socket until it closes. Returns whether the broker acknowledged
/// the registration; the session only counts as connected from that point.
async fn run_session(inner: &Arc<Inner>, ws: WsStream, cancel: &CancellationToken) -> bool {
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);

    let register = ClientMessage::register(inner.app_id.clone(), inner.options.api_key.clone());
    let sent = match register.to_json() {
        Ok(json) => sink.send(Message::text(json)).await.is_ok(),
        Err(_) => false,
    };
    if !sent {
        warn!("failed to send register");
        return false;
    }

    let mut registered = false;
    let registration_deadline = tokio::time::sleep(inner.options.request_timeout);
    tokio::pin!(registration_deadline);

    let ping = ClientMessage::Ping.to_json().unwrap_or_default();
    let mut heartbeat = tokio::time::interval(inner.options.heartbeat_interval);
    let _ = heartbeat.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            Some(text) = rx.recv() => {
                if sink.send(Message::text(text)).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if sink.send(Message::text(ping.clone())).await.is_err() {
                    break;
                }
            }
            () = &mut registration_deadline, if !registered => {
                warn!("broker did not acknowledge registration");
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if inner.handle_server_text(text.as_str(), &tx) && !registered {
                        registered = true;
                        *inner.outbound.lock() = Some(tx.clone());
                        let _ = inner.state.set(ConnectionState::Connected);
                        info!("connected to broker");
                        fire(inner.hooks.on_connect.as_ref());
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    *inner.outbound.lock() = None;
    // Dropping the senders wakes every waiter with `ConnectionClosed`.
    inner.pending.lock().clear();
    let _ = inner.state.set(ConnectionState::Disconnected);
    if registered {
        info!("disconnected from broker");
        fire(inner.hooks.on_disconnect.as_ref());
    }
    registered
}

async fn poll(inner: &Arc<Inner>, cancel: &CancellationToken) {
    inner.polling.store(true, Ordering::Relaxed);
    fire(inner.hooks.on_fallback.as_ref());

    let mut ticker = tokio::time::interval(inner.options.poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => inner.poll_once().await,
            () = cancel.cancelled() => break,
        }
    }
    inner.polling.store(false, Ordering::Relaxed);
}

// ─────────────────────────────────────────────────────────────────────────────
// Public handle
// ─────────────────────────────────────────────────────────────────────────────

/// A peer application's handle on the broker. Cheap to clone.
#[derive(Clone)]
pub struct PeerClient {
    inner: Arc<Inner>,
}

impl PeerClient {
    /// Build a client for `app_id`; connects immediately when `auto_connect` is set.
    ///
    /// In demo mode the inbox starts with the sample notifications.
    pub fn init(
        app_id: impl Into<String>,
        options: ClientOptions,
        hooks: LifecycleHooks,
    ) -> Result<Self, ClientError> {
        let app_id = app_id.into();
        let gateway = FallbackGateway::new(
            options.http_base(),
            options.api_key.clone(),
            app_id.clone(),
            options.request_timeout,
        )?;

        let mut inbox = Inbox::new(INBOX_CAPACITY);
        if options.demo_mode {
            for (record, read) in demo::sample_notifications(Utc::now()).into_iter().rev() {
                let _ = inbox.insert(record, read);
            }
        }

        let client = Self {
            inner: Arc::new(Inner {
                app_id,
                hooks,
                state: StateCell::new(),
                polling: AtomicBool::new(false),
                listeners: Arc::new(ListenerRegistry::new()),
                inbox: Mutex::new(inbox),
                outbound: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                gateway,
                driver: Mutex::new(None),
                options,
            }),
        };
        if client.inner.options.auto_connect {
            client.connect()?;
        }
        Ok(client)
    }

    /// Start the connection driver. No-op while one is already running.
    pub fn connect(&self) -> Result<(), ClientError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        let mut driver = self.inner.driver.lock();
        if driver.as_ref().is_some_and(|d| !d.handle.is_finished()) {
            return Ok(());
        }
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(drive(Arc::clone(&self.inner), cancel.clone()));
        *driver = Some(Driver { cancel, handle });
        Ok(())
    }

    /// Close the connection, cancel any scheduled reconnect, and stop polling.
    pub async fn disconnect(&self) {
        let driver = self.inner.driver.lock().take();
        if let Some(driver) = driver {
            driver.cancel.cancel();
            let _ = driver.handle.await;
        }
        let _ = self.inner.state.set(ConnectionState::Disconnected);
    }

    /// The declared application id.
    pub fn app_id(&self) -> &str {
        &self.inner.app_id
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Whether the client has degraded to HTTP polling.
    pub fn is_polling(&self) -> bool {
        self.inner.polling.load(Ordering::Relaxed)
    }

    /// Wait until the connection reaches `target`, up to `timeout`.
    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> bool {
        self.inner.state.wait_for(target, timeout).await
    }

    /// Publish a notification.
    ///
    /// Uses the open connection when there is one, else the HTTP fallback
    /// (when enabled), else a synthetic record in demo mode. Returns `None`
    /// when every available path fails.
    pub async fn send_notification(
        &self,
        title: &str,
        description: &str,
        kind: &str,
        options: SendOptions,
    ) -> Option<NotificationRecord> {
        let app_id = self.inner.app_id.as_str();
        let draft = options.into_draft(title, description, kind, app_id);

        let mut try_http = self.inner.options.fallback_mode;
        if self.state() == ConnectionState::Connected {
            match self.publish_over_connection(&draft).await {
                Ok(record) => return Some(record),
                Err(e) => {
                    warn!(app_id, error = %e, "publish over connection failed");
                    try_http &= e.is_undelivered();
                }
            }
        }

        if try_http {
            match self.inner.gateway.publish(&draft).await {
                Ok(record) => return Some(record),
                Err(e) => warn!(app_id, error = %e, "publish over http fallback failed"),
            }
        }

        if self.inner.options.demo_mode {
            let record = demo::synthetic_record(draft, app_id);
            self.inner.deliver(record.clone());
            return Some(record);
        }
        None
    }

    async fn publish_over_connection(
        &self,
        draft: &framecast_core::NotificationDraft,
    ) -> Result<NotificationRecord, ClientError> {
        let sender = self
            .inner
            .outbound
            .lock()
            .clone()
            .ok_or(ClientError::NotConnected)?;

        let request_id = uuid::Uuid::now_v7().to_string();
        let frame = ClientMessage::new_notification(
            self.inner.app_id.clone(),
            Some(request_id.clone()),
            draft.clone(),
        )
        .to_json()?;

        let (ack_tx, ack_rx) = oneshot::channel();
        let _ = self.inner.pending.lock().insert(request_id.clone(), ack_tx);
        if sender.send(frame).await.is_err() {
            let _ = self.inner.pending.lock().remove(&request_id);
            return Err(ClientError::NotConnected);
        }

        match tokio::time::timeout(self.inner.options.publish_ack_timeout, ack_rx).await {
            Ok(Ok(Ok(record))) => Ok(record),
            Ok(Ok(Err(message))) => Err(ClientError::Rejected(message)),
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                let _ = self.inner.pending.lock().remove(&request_id);
                Err(ClientError::Timeout("publish acknowledgement"))
            }
        }
    }

    /// Register a handler for every inbound notification.
    pub fn on_notification(
        &self,
        handler: impl Fn(&NotificationRecord) + Send + Sync + 'static,
    ) -> Disposer {
        let id = self.inner.listeners.subscribe(handler);
        Disposer::new(id, &self.inner.listeners)
    }

    /// Broker history over HTTP, newest first.
    ///
    /// In demo mode an unreachable broker yields the sample set instead.
    pub async fn fetch_history(&self) -> Result<Vec<NotificationRecord>, ClientError> {
        match self.inner.gateway.history().await {
            Ok(records) => Ok(records),
            Err(e) if self.inner.options.demo_mode => {
                debug!(error = %e, "broker unreachable, returning demo history");
                Ok(demo::sample_notifications(Utc::now())
                    .into_iter()
                    .map(|(record, _)| record)
                    .collect())
            }
            Err(e) => Err(e),
        }
    }

    /// Received notifications, newest first.
    pub fn notifications(&self) -> Vec<InboxEntry> {
        self.inner.inbox.lock().entries()
    }

    /// Number of unread notifications.
    pub fn unread_count(&self) -> usize {
        self.inner.inbox.lock().unread_count()
    }

    /// Mark one notification read. Returns `false` for an unknown id.
    pub fn mark_read(&self, id: &str) -> bool {
        self.inner.inbox.lock().mark_read(id)
    }

    /// Mark every notification read.
    pub fn mark_all_read(&self) {
        self.inner.inbox.lock().mark_all_read();
    }
}
