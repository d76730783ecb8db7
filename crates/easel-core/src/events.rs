use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ids::SessionId;

/// Everything a run can report to the UI. The set is closed: the UI
/// subscribes by name and must never see anything outside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasEvent {
    /// First event of every session, carrying the allocated id.
    Session { session_id: SessionId },
    /// One streamed text fragment from the model.
    Content { delta: String },
    /// A canvas mutation the UI should apply.
    Tool { name: String, args: Value },
    /// Ask the UI to report a fresh snapshot.
    #[serde(rename = "get_canvas_state_request")]
    StateRequest,
    Done,
    Error { message: String },
}

impl CanvasEvent {
    pub const NAMES: [&'static str; 6] = [
        "session",
        "content",
        "tool",
        "get_canvas_state_request",
        "done",
        "error",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
            Self::Content { .. } => "content",
            Self::Tool { .. } => "tool",
            Self::StateRequest => "get_canvas_state_request",
            Self::Done => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Payload as the UI receives it.
    pub fn payload(&self) -> Value {
        match self {
            Self::Session { session_id } => Value::String(session_id.to_string()),
            Self::Content { delta } => Value::String(delta.clone()),
            Self::Tool { name, args } => json!({ "name": name, "args": args }),
            Self::StateRequest | Self::Done => Value::Null,
            Self::Error { message } => Value::String(message.clone()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }
}

/// One-way emitter owned by the host. Fire-and-forget: implementations must
/// not block and cannot push back on the caller.
pub trait EventSink: Send + Sync {
    fn emit(&self, session_id: &SessionId, event: CanvasEvent);
}

/// Sink that remembers everything it was given, in order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(SessionId, CanvasEvent)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(SessionId, CanvasEvent)> {
        self.events.lock().clone()
    }

    /// Events for one session, without the id.
    pub fn events_for(&self, session_id: &SessionId) -> Vec<CanvasEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(id, _)| id == session_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|(_, e)| e.name()).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, session_id: &SessionId, event: CanvasEvent) {
        self.events.lock().push((session_id.clone(), event));
    }
}
