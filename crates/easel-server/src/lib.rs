//! WebSocket host for canvas agent sessions.

pub mod client;
pub mod event_bridge;
pub mod handlers;
pub mod orchestrator;
pub mod rpc;
pub mod server;
pub mod wire;

pub use event_bridge::{BroadcastSink, SessionEvent};
pub use orchestrator::{wait_for_idle, AgentOrchestrator, EngineOrchestrator, ProviderFactory, StartRequest};
pub use server::{start, ServerConfig, ServerHandle};
