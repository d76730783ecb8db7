pub mod canvas;
pub mod context;
pub mod errors;
pub mod events;
pub mod ids;
pub mod messages;
pub mod phase;
pub mod provider;
pub mod security;
pub mod stream;
pub mod tools;

pub use canvas::{NodeKind, StateSnapshot};
pub use errors::GatewayError;
pub use events::{CanvasEvent, EventSink, RecordingSink};
pub use ids::{SessionId, ToolCallId};
pub use phase::RunPhase;
