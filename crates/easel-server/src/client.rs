use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use easel_core::ids::SessionId;

/// Missed heartbeats tolerated before a client counts as dead.
const MISSED_PONGS: u64 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(pub String);

impl Default for ClientId {
    fn default() -> Self {
        Self(format!("client_{}", Uuid::now_v7()))
    }
}

impl ClientId {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A connected WebSocket client and the sessions it follows.
pub struct Client {
    pub id: ClientId,
    sessions: Mutex<HashSet<SessionId>>,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
    last_pong: AtomicU64,
}

impl Client {
    fn new(id: ClientId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            sessions: Mutex::new(HashSet::new()),
            tx,
            connected: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn follows(&self, session_id: &SessionId) -> bool {
        self.sessions.lock().contains(session_id)
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < timeout.as_secs()
    }

    fn push(&self, message: String) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                warn!(client_id = %self.id, msg_len = msg.len(), "send queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Connected clients, keyed by id.
pub struct ClientRegistry {
    clients: DashMap<ClientId, Arc<Client>>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self { clients: DashMap::new(), max_send_queue: max_send_queue.max(1) }
    }

    /// Register a new client and return its id plus its outbound queue.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<String>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.clients.insert(id.clone(), Arc::new(Client::new(id.clone(), tx)));
        (id, rx)
    }

    pub fn unregister(&self, id: &ClientId) {
        if let Some((_, client)) = self.clients.remove(id) {
            client.connected.store(false, Ordering::Relaxed);
        }
    }

    pub fn get(&self, id: &ClientId) -> Option<Arc<Client>> {
        self.clients.get(id).map(|c| Arc::clone(c.value()))
    }

    /// Start pushing a session's events to a client. False if the client is gone.
    pub fn subscribe(&self, client_id: &ClientId, session_id: SessionId) -> bool {
        match self.get(client_id) {
            Some(client) => {
                debug!(client_id = %client_id, session_id = %session_id, "client subscribed");
                client.sessions.lock().insert(session_id);
                true
            }
            None => false,
        }
    }

    /// Queue a message for one client. Drops it if the queue is full.
    pub fn send_to(&self, client_id: &ClientId, message: String) -> bool {
        self.get(client_id).is_some_and(|c| c.push(message))
    }

    /// Queue a message for every connected client following `session_id`.
    pub fn broadcast_to_session(&self, session_id: &SessionId, message: &str) -> usize {
        let targets: Vec<Arc<Client>> = self
            .clients
            .iter()
            .filter(|entry| entry.is_connected() && entry.follows(session_id))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        targets.iter().filter(|c| c.push(message.to_string())).count()
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub fn clients_for_session(&self, session_id: &SessionId) -> Vec<ClientId> {
        self.clients
            .iter()
            .filter(|entry| entry.follows(session_id))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Remove clients that have not answered a ping within `timeout`.
    pub fn cleanup_dead_clients(&self, timeout: Duration) -> usize {
        let dead: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|entry| !entry.is_alive(timeout))
            .map(|entry| entry.key().clone())
            .collect();

        for id in &dead {
            self.unregister(id);
            info!(client_id = %id, "cleaned up dead client");
        }
        dead.len()
    }
}

/// Pump one WebSocket: outbound queue plus pings on one task, inbound text
/// to `on_message` on another. Returns when either side closes.
pub async fn handle_ws_connection(
    socket: WebSocket,
    client_id: ClientId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ClientRegistry>,
    on_message: mpsc::Sender<(ClientId, String)>,
    heartbeat: Duration,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_cid = client_id.clone();
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    trace!(client_id = %writer_cid, "sent ping");
                }
            }
        }
    });

    let reader_cid = client_id.clone();
    let reader_registry = Arc::clone(&registry);
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    if on_message.send((reader_cid.clone(), text.to_string())).await.is_err() {
                        break;
                    }
                }
                WsMessage::Pong(_) => {
                    if let Some(client) = reader_registry.get(&reader_cid) {
                        client.record_pong();
                    }
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    registry.unregister(&client_id);
    info!(client_id = %client_id, "client disconnected");
}

/// Periodically drop clients that stopped answering pings.
pub fn start_cleanup_task(registry: Arc<ClientRegistry>, heartbeat: Duration) -> tokio::task::JoinHandle<()> {
    let timeout = heartbeat * MISSED_PONGS as u32;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let removed = registry.cleanup_dead_clients(timeout);
            if removed > 0 {
                info!(removed, "dead client cleanup");
            }
        }
    })
}
