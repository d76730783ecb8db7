use serde::Serialize;
use serde_json::Value;

use easel_core::events::CanvasEvent;
use easel_core::ids::SessionId;

/// Prefix of every event topic pushed to clients.
pub const TOPIC_PREFIX: &str = "ai:stream:";

/// One pushed event as the UI receives it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub topic: String,
    pub session_id: String,
    pub timestamp: String,
    pub data: Value,
}

impl WireEvent {
    pub fn new(session_id: &SessionId, event: &CanvasEvent) -> Self {
        Self {
            topic: format!("{TOPIC_PREFIX}{}", event.name()),
            session_id: session_id.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            data: event.payload(),
        }
    }
}

pub fn to_json(session_id: &SessionId, event: &CanvasEvent) -> Option<String> {
    serde_json::to_string(&WireEvent::new(session_id, event)).ok()
}
