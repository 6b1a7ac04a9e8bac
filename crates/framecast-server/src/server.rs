//! `FramecastServer`: Axum HTTP + WebSocket server around a [`Broker`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::broker::Broker;
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::gateway::{self, api_error};
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::heartbeat::run_heartbeat;
use crate::websocket::session::handle_socket;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry, history and router.
    pub broker: Arc<Broker>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
    /// Per-connection outbound queue depth.
    pub send_queue_size: usize,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
}

/// Background tasks of a listening server.
pub struct ServerHandle {
    /// Bound address (resolved port when configured with `0`).
    pub addr: SocketAddr,
    server: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl ServerHandle {
    /// Bound port.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// The broker server.
pub struct FramecastServer {
    config: ServerConfig,
    broker: Arc<Broker>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl FramecastServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, broker: Arc<Broker>, metrics: PrometheusHandle) -> Self {
        Self {
            config,
            broker,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes, at `/` and under `/api`.
    pub fn router(&self) -> Router {
        let state = AppState {
            broker: Arc::clone(&self.broker),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            send_queue_size: self.config.send_queue_size,
            max_message_size: self.config.max_message_size,
        };

        let routes: Router<AppState> = Router::new()
            .route(
                "/notifications",
                get(gateway::list_notifications).post(gateway::create_notification),
            )
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler));

        let router = Router::new()
            .merge(routes.clone())
            .nest("/api", routes)
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        if self.config.cors_allow_any {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Bind the listener and spawn the HTTP server and Heartbeat Monitor.
    pub async fn listen(&self) -> Result<ServerHandle, ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "http server failed");
            }
        });

        let heartbeat = tokio::spawn(run_heartbeat(
            Arc::clone(&self.broker),
            self.config.heartbeat_interval,
            self.shutdown.token(),
        ));

        info!(
            addr = %local_addr,
            heartbeat_ms = u64::try_from(self.config.heartbeat_interval.as_millis()).unwrap_or(u64::MAX),
            history_capacity = self.config.history_capacity,
            "framecast broker listening"
        );
        Ok(ServerHandle {
            addr: local_addr,
            server,
            heartbeat,
        })
    }

    /// Close every connection and wait for background tasks.
    pub async fn shutdown(&self, handle: ServerHandle) {
        self.shutdown.shutdown();
        self.broker.close_all();
        self.shutdown
            .graceful_shutdown(
                vec![handle.server, handle.heartbeat],
                self.config.shutdown_timeout,
            )
            .await;
        info!("framecast broker stopped");
    }

    /// The broker.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// The shutdown coordinator.
    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.broker.connection_count(),
        state.broker.history_len(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return api_error(StatusCode::SERVICE_UNAVAILABLE, "broker is shutting down");
    }
    let AppState {
        broker,
        shutdown,
        send_queue_size,
        max_message_size,
        ..
    } = state;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, broker, shutdown.token(), send_queue_size))
        .into_response()
}
