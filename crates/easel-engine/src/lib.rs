//! Canvas agent engine: the per-session snapshot mailbox, the canvas tool
//! set, and the loop that drives a chat model through them.

pub mod error;
pub mod format;
pub mod mailbox;
pub mod phase;
pub mod prompt;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod sessions;
pub mod tools;

pub use error::EngineError;
pub use mailbox::{MailboxRecv, StateMailbox};
pub use phase::PhaseHandle;
pub use registry::ToolRegistry;
pub use runner::{AgentConfig, AgentRunner, RunOutcome, StopKind};
pub use sessions::SessionRegistry;
pub use tools::{create_canvas_registry, GetCanvasStateTool};
