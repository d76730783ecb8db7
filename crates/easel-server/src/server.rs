use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use easel_settings::ServerSettings;

use crate::client::{self, ClientId, ClientRegistry};
use crate::event_bridge::{self, BroadcastSink};
use crate::handlers::{self, HandlerState};
use crate::orchestrator::AgentOrchestrator;
use crate::rpc::{RpcRequest, RpcResponse};

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_send_queue: usize,
    pub heartbeat_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_send_queue: settings.max_send_queue,
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms.max(1_000)),
        }
    }
}

/// Shared application state passed to axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler_state: Arc<HandlerState>,
    pub client_registry: Arc<ClientRegistry>,
    pub message_tx: mpsc::Sender<(ClientId, String)>,
    pub heartbeat_interval: Duration,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind, then serve `/ws` and `/health` until [`ServerHandle::shutdown`].
/// Events published on `sink` are pushed to subscribed clients.
pub async fn start(
    config: ServerConfig,
    orchestrator: Arc<dyn AgentOrchestrator>,
    sink: &BroadcastSink,
) -> Result<ServerHandle, std::io::Error> {
    let client_registry = Arc::new(ClientRegistry::new(config.max_send_queue));

    let bridge = event_bridge::create_bridge(Arc::clone(&client_registry), sink.subscribe());
    let cleanup = client::start_cleanup_task(Arc::clone(&client_registry), config.heartbeat_interval);

    let (msg_tx, msg_rx) = mpsc::channel::<(ClientId, String)>(1024);
    let handler_state = Arc::new(HandlerState::new(orchestrator, Arc::clone(&client_registry)));
    let rpc = tokio::spawn(process_rpc_messages(msg_rx, Arc::clone(&handler_state)));

    let router = build_router(AppState {
        handler_state,
        client_registry,
        message_tx: msg_tx,
        heartbeat_interval: config.heartbeat_interval,
    });

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "easel server listening");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
        {
            tracing::error!(error = %e, "server stopped with error");
        }
    });

    Ok(ServerHandle { addr: local_addr, shutdown, server, background: vec![bridge, cleanup, rpc] })
}

/// Keeps the server's tasks alive; [`shutdown`](Self::shutdown) stops them.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: CancellationToken,
    server: tokio::task::JoinHandle<()>,
    background: Vec<tokio::task::JoinHandle<()>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in &self.background {
            task.abort();
        }
        // Open WebSockets keep graceful shutdown waiting; don't hang on them.
        if tokio::time::timeout(Duration::from_secs(5), self.server).await.is_err() {
            debug!("server did not drain in time");
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client_id, rx) = state.client_registry.register();
    info!(client_id = %client_id, "client connected");

    client::handle_ws_connection(
        socket,
        client_id,
        rx,
        state.client_registry,
        state.message_tx,
        state.heartbeat_interval,
    )
    .await;
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "activeRuns": state.handler_state.orchestrator.active_count(),
        "clients": state.client_registry.count(),
    }))
}

async fn process_rpc_messages(mut rx: mpsc::Receiver<(ClientId, String)>, state: Arc<HandlerState>) {
    while let Some((client_id, raw)) = rx.recv().await {
        let response = match serde_json::from_str::<RpcRequest>(&raw) {
            Ok(request) => {
                debug!(client_id = %client_id, method = %request.method, "rpc request");
                let params = request.params.unwrap_or_else(|| json!({}));
                handlers::dispatch(&state, &client_id, &request.method, &params, request.id)
            }
            Err(_) => RpcResponse::parse_error(),
        };

        if let Ok(json) = serde_json::to_string(&response) {
            state.clients.send_to(&client_id, json);
        }
    }
}
