use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, trace, warn};

use easel_core::events::{CanvasEvent, EventSink};
use easel_core::ids::SessionId;

use crate::client::ClientRegistry;
use crate::wire;

pub type SessionEvent = (SessionId, CanvasEvent);

/// [`EventSink`] that publishes onto a broadcast channel. Never blocks; with
/// no subscribers the event is dropped.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<SessionEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, session_id: &SessionId, event: CanvasEvent) {
        let name = event.name();
        if self.tx.send((session_id.clone(), event)).is_err() {
            trace!(session_id = %session_id, event = name, "no event receivers, event dropped");
        }
    }
}

/// Forward engine events to the clients subscribed to each session.
pub fn create_bridge(
    registry: Arc<ClientRegistry>,
    mut rx: broadcast::Receiver<SessionEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok((session_id, event)) => {
                    if let Some(json) = wire::to_json(&session_id, &event) {
                        registry.broadcast_to_session(&session_id, &json);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event bridge lagged, dropped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("event bridge channel closed");
                    break;
                }
            }
        }
    })
}
